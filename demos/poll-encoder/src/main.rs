//! Poll encoder example
//!
//! Reads an ACE-128 on its I2C backpack from a Raspberry Pi Pico 2 and logs
//! the raw, unsigned, signed and multi-turn positions via defmt whenever the
//! shaft moves.
//!
//! # Wiring
//!
//! | Signal    | Pico 2 Pin | Notes                              |
//! |-----------|------------|------------------------------------|
//! | I2C0 SDA  | GP20       |                                    |
//! | I2C0 SCL  | GP21       |                                    |
//! | Backpack  | 0x38       | A0–A2 tied low                     |

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::*;
use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
use embassy_executor::Spawner;
use embassy_rp as hal;
use embassy_rp::block::ImageDef;
use embassy_rp::i2c::{self, Blocking, I2c};
use embassy_rp::peripherals::I2C0;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Ticker, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use ace128_driver::{Ace128, Ace128Config, Ace128Error, DEFAULT_ADDRESS};

/// Tell the Boot ROM about our application.
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = hal::block::ImageDef::secure_exe();

/// Shared I2C0 bus. The encoder borrows it through an `I2cDevice`, so a
/// failed construction leaves the peripheral available for another attempt.
static I2C_BUS: StaticCell<Mutex<NoopRawMutex, RefCell<I2c<'static, I2C0, Blocking>>>> =
    StaticCell::new();

/// The multi-turn count needs a read at least every half turn; 1 kHz covers
/// any hand-turned knob.
const POLL_PERIOD: Duration = Duration::from_millis(1);

const RETRY_PERIOD: Duration = Duration::from_millis(500);

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    // --- I2C bus (GP20 = SDA, GP21 = SCL) ---
    let i2c = I2c::new_blocking(p.I2C0, p.PIN_21, p.PIN_20, i2c::Config::default());
    let i2c_bus = I2C_BUS.init(Mutex::new(RefCell::new(i2c)));

    // --- Encoder ---
    // Only a bus failure or a bad pin order ends up here; an undecodable first
    // read is absorbed by the driver. Keep trying until the backpack answers.
    let mut encoder = loop {
        match Ace128::new(I2cDevice::new(i2c_bus), DEFAULT_ADDRESS, Ace128Config::default()) {
            Ok(encoder) => break encoder,
            Err(e) => {
                error!("Encoder init failed: {}", Debug2Format(&e));
                Timer::after(RETRY_PERIOD).await;
            }
        }
    };

    info!("Encoder example started, zero at raw {}", encoder.zero());

    let mut ticker = Ticker::every(POLL_PERIOD);
    let mut previous = None;

    // Main loop: read, log on change, repeat.
    loop {
        ticker.next().await;

        let multi = match encoder.multi_turn_position() {
            Ok(multi) => multi,
            // A pattern caught mid-transition; the next tick will read again.
            Err(Ace128Error::Decode { pattern }) => {
                debug!("Undecodable pattern {=u8:#x}", pattern);
                continue;
            }
            Err(e) => {
                error!("Read failed: {}", Debug2Format(&e));
                continue;
            }
        };

        if previous == Some(multi) {
            continue;
        }
        previous = Some(multi);

        match (
            encoder.raw_position(),
            encoder.unsigned_position(),
            encoder.signed_position(),
        ) {
            (Ok(raw), Ok(unsigned), Ok(signed)) => {
                info!(
                    "raw {} upos {} pos {} mpos {}",
                    raw, unsigned, signed, multi
                );
            }
            _ => info!("mpos {}", multi),
        }
    }
}
