//! Hard limits on request input. Anything beyond these is rejected as a
//! validation error before it touches a store.

/// Minutes in the booking day; the window end resolves to this past midnight.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

pub const MAX_STATIONS_PER_BOOKING: usize = 64;

/// Multi-day spans are not supported.
pub const MAX_BOOKING_MINUTES: i64 = 24 * 60;

pub const MAX_COMMENT_LEN: usize = 1_000;
pub const MAX_CLIENT_NAME_LEN: usize = 200;
pub const MAX_CLIENT_PHONE_LEN: usize = 32;
pub const MAX_STATION_NAME_LEN: usize = 200;
pub const MAX_STATIONS: usize = 10_000;
