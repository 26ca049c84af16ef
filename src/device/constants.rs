/**
 * How long (milliseconds) a scan runs before it stops by itself.
 */
pub const SCAN_WINDOW: u64 = 10_000;

/**
 * Advertised names of the stepper controller contain this marker. Anything else is ignored
 * while scanning.
 */
pub const DEVICE_NAME_MARKER: &str = "ESP32";

/**
 * Shown for a connected device whose name was never stored.
 */
pub const FALLBACK_DEVICE_NAME: &str = "ESP32 Device";
