//! Low-level backpack driver.
//!
//! The PCF8574 has no registers: every transaction is a bare one-byte read or
//! write addressed to the device. This module is crate-private; consumers use
//! [`Ace128`](crate::Ace128) instead.

use embedded_hal::i2c::I2c;

/// Owns the I2C peripheral and the device address of one backpack.
pub(crate) struct ExpanderDriver<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> ExpanderDriver<I2C>
where
    I2C: I2c,
{
    /// # Arguments
    /// * `i2c` — I2C peripheral (takes ownership for exclusive access)
    /// * `address` — 7-bit I2C device address (typically 0x38)
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Read the current level of all eight port pins.
    ///
    /// Issues a fresh bus transaction on every call; nothing is cached.
    pub fn read_u8(&mut self) -> Result<u8, I2C::Error> {
        let mut buf = [0u8; 1];
        self.i2c.read(self.address, &mut buf)?;
        Ok(buf[0])
    }

    /// Write the port latch byte.
    ///
    /// A `1` bit releases the line to the weak pull-up, which is how the
    /// PCF8574 turns a pin into an input.
    pub fn write_u8(&mut self, value: u8) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[value])
    }

    /// Give back the I2C peripheral.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    #[test]
    fn read_issues_one_byte_read_each_call() {
        let expectations = [
            I2cTransaction::read(0x38, vec![0xA5]),
            I2cTransaction::read(0x38, vec![0x5A]),
        ];
        let mut driver = ExpanderDriver::new(I2cMock::new(&expectations), 0x38);

        assert_eq!(driver.read_u8().unwrap(), 0xA5);
        assert_eq!(driver.read_u8().unwrap(), 0x5A);

        driver.release().done();
    }

    #[test]
    fn write_sends_single_byte() {
        let expectations = [I2cTransaction::write(0x39, vec![0xFF])];
        let mut driver = ExpanderDriver::new(I2cMock::new(&expectations), 0x39);

        driver.write_u8(0xFF).unwrap();
        assert_eq!(driver.address(), 0x39);

        driver.release().done();
    }

    #[test]
    fn bus_error_is_returned_unchanged() {
        let expectations =
            [I2cTransaction::read(0x38, vec![0x00]).with_error(ErrorKind::Other)];
        let mut driver = ExpanderDriver::new(I2cMock::new(&expectations), 0x38);

        assert_eq!(driver.read_u8(), Err(ErrorKind::Other));

        driver.release().done();
    }
}
