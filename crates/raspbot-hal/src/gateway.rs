//! The `DeviceGateway` trait: typed access to the expansion board on the bus.
//!
//! | Operation | Board function |
//! |---|---|
//! | `set_motor` | DC motor channel 0–3, signed speed −255..=255 |
//! | `set_servo` | servo 1 (pan) / 2 (tilt), angle in degrees |
//! | `set_all_pixels` | strip-wide effect code + parameter (`0, 0` = off) |
//! | `set_pixel_rgb` | one pixel by index |
//! | `set_all_pixels_rgb` | every pixel |
//! | `set_buzzer` | on/off |
//! | `set_ultrasonic_enabled` / `set_infrared_enabled` | sensor power |
//! | `read_register_block` | raw register read |
//!
//! The wire protocol itself lives behind the trait; callers serialize access
//! through the hardware mutex domain, so implementations need only be `Send`.

use raspbot_types::BotError;

/// Motor channels driven by every whole-robot command.
pub const MOTOR_CHANNELS: [u8; 4] = [0, 1, 2, 3];
/// Left-side track (front and rear).
pub const LEFT_MOTORS: [u8; 2] = [0, 1];
/// Right-side track (front and rear).
pub const RIGHT_MOTORS: [u8; 2] = [2, 3];

/// High byte of the ultrasonic distance in millimetres.
pub const REG_ULTRASONIC_HIGH: u8 = 0x1B;
/// Low byte of the ultrasonic distance in millimetres.
pub const REG_ULTRASONIC_LOW: u8 = 0x1A;
/// Last decoded infrared remote key.
pub const REG_INFRARED: u8 = 0x0C;

/// Fallible capability over the robot's expansion board.
///
/// Every call returns [`BotError::Bus`] on failure; nothing here panics.
pub trait DeviceGateway: Send {
    fn set_motor(&mut self, channel: u8, speed: i16) -> Result<(), BotError>;

    fn set_servo(&mut self, id: u8, angle: u8) -> Result<(), BotError>;

    fn set_all_pixels(&mut self, effect_code: u8, param: u8) -> Result<(), BotError>;

    fn set_pixel_rgb(&mut self, index: u8, r: u8, g: u8, b: u8) -> Result<(), BotError>;

    fn set_all_pixels_rgb(&mut self, r: u8, g: u8, b: u8) -> Result<(), BotError>;

    fn set_buzzer(&mut self, on: bool) -> Result<(), BotError>;

    fn set_ultrasonic_enabled(&mut self, on: bool) -> Result<(), BotError>;

    fn set_infrared_enabled(&mut self, on: bool) -> Result<(), BotError>;

    /// Read `len` bytes starting at register `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Bus`] when the transfer fails. A short read is not
    /// an error; callers inspect the returned length.
    fn read_register_block(&mut self, addr: u8, len: usize) -> Result<Vec<u8>, BotError>;
}
