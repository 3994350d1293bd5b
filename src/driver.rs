//! Register-level driver for the YMF825 synthesizer.
//!
//! Everything chip-specific lives here: the interface register map, the
//! power-up sequence, tone data loading and note key-on/key-off. The
//! bus below only ever sees opaque address and data bytes.

use std::time::Duration;

use crate::bus::Ymf825Bus;
use crate::error::Ymf825Error;
use crate::Result;

/// Interface register addresses, numbered as in the YMF825 datasheet.
pub mod reg {
    /// Clock enable.
    pub const CLKE: u8 = 0x00;
    /// Analog block reset.
    pub const ALRST: u8 = 0x01;
    /// Analog block power control.
    pub const AP: u8 = 0x02;
    /// Speaker amplifier gain.
    pub const GAIN: u8 = 0x03;
    /// Hardware identification, reads as 0x01.
    pub const HW_ID: u8 = 0x04;
    /// Tone data port, written in bursts.
    pub const CONTENTS_DATA: u8 = 0x07;
    /// Sequencer setting flags.
    pub const SEQUENCER_SETTING: u8 = 0x08;
    /// Sequencer volume.
    pub const SEQUENCER_VOLUME: u8 = 0x09;
    /// Sequencer data size.
    pub const SEQUENCER_SIZE: u8 = 0x0A;
    /// Voice selection for the indirect voice registers.
    pub const VOICE_NUM: u8 = 0x0B;
    /// Per-voice channel volume.
    pub const VOICE_VOLUME: u8 = 0x0C;
    /// F-number high bits and octave block.
    pub const FNUM_HIGH: u8 = 0x0D;
    /// F-number low bits.
    pub const FNUM_LOW: u8 = 0x0E;
    /// Key-on flag and tone selection.
    pub const KEY_ON: u8 = 0x0F;
    /// Mute interpolation time.
    pub const MUTE_TIME: u8 = 0x14;
    /// Sequencer time unit, high bits.
    pub const MS_S_HIGH: u8 = 0x17;
    /// Sequencer time unit, low bits.
    pub const MS_S_LOW: u8 = 0x18;
    /// Master volume.
    pub const MASTER_VOLUME: u8 = 0x19;
    /// Soft reset ramp.
    pub const SOFT_RESET: u8 = 0x1A;
    /// Volume interpolation settings.
    pub const INTERPOLATION: u8 = 0x1B;
    /// Power rail configuration for the output drivers.
    pub const DRIVE_POWER: u8 = 0x1D;
}

/// Upper bound on one tone data load, matching the stream protocol's
/// [`MAX_BURST_LEN`].
///
/// [`MAX_BURST_LEN`]: crate::wire::MAX_BURST_LEN
pub const MAX_TONE_DATA_LEN: usize = 512;

/// Value read back from [`reg::HW_ID`] by a live chip.
const HARDWARE_ID: u8 = 0x01;

/// Key-on flag in [`reg::KEY_ON`]; the low bits select the tone number.
const KEY_ON_FLAG: u8 = 0x40;

/// Sequencer flags stopping playback and flushing the FIFO, written
/// before the sequencer is reconfigured or tone data is loaded.
const SEQUENCER_STOP: u8 = 0xF6;

/// All-key-off flag in [`reg::SEQUENCER_SETTING`].
const ALL_KEY_OFF: u8 = 0x80;

const SETTLE: Duration = Duration::from_millis(1);
const RESET_SETTLE: Duration = Duration::from_millis(30);
const SEQUENCER_SETTLE: Duration = Duration::from_millis(21);

/// Register-level driver for the YMF825.
///
/// Generic over the logical bus, so the same code drives a chip wired
/// to the local bridge ([`SpiBus`]) or one behind a [`StreamBus`]. The
/// bus target must already be selected; this type never changes it.
///
/// # Example
///
/// ```no_run
/// use ymf825::{SpiBus, SpiConfig, Ymf825Bus, Ymf825Driver};
///
/// # fn main() -> ymf825::Result<()> {
/// let mut bus = SpiBus::open(0, &SpiConfig::default())?;
/// bus.set_target(0x08)?;
/// bus.reset_hardware()?;
///
/// let mut driver = Ymf825Driver::new(bus);
/// driver.check_available()?;
/// driver.reset_software()?;
/// # Ok(())
/// # }
/// ```
///
/// [`SpiBus`]: crate::SpiBus
/// [`StreamBus`]: crate::StreamBus
pub struct Ymf825Driver<B> {
    bus: B,
}

impl<B: Ymf825Bus> Ymf825Driver<B> {
    /// Creates a driver over a bus whose target is already selected.
    #[must_use]
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Returns a reference to the underlying bus.
    #[must_use]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Returns a mutable reference to the underlying bus, for target
    /// changes or counter inspection.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Releases the underlying bus.
    #[must_use]
    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Reads the hardware identification register.
    pub fn hardware_id(&mut self) -> Result<u8> {
        self.bus.read(reg::HW_ID)
    }

    /// Verifies that a YMF825 answers on the selected target.
    ///
    /// Returns [`DeviceNotFound`] if the identification register reads
    /// as anything but the fixed hardware ID, which usually means a
    /// wiring problem or a wrong chip-select mask.
    ///
    /// [`DeviceNotFound`]: Ymf825Error::DeviceNotFound
    pub fn check_available(&mut self) -> Result<()> {
        let id = self.hardware_id()?;
        if id == HARDWARE_ID {
            Ok(())
        } else {
            log::warn!("hardware ID register answered {id:#04x}");
            Err(Ymf825Error::DeviceNotFound)
        }
    }

    /// Runs the chip's power-up register sequence: output drive power,
    /// analog power-down, clock enable, the soft-reset ramp, staged
    /// analog power-up, then a baseline audio path (full master volume,
    /// gain 1, sequencer stopped and cleared).
    ///
    /// The settle delays between steps follow the datasheet power-on
    /// procedure; the whole call blocks for roughly 55 ms. Typically
    /// preceded by [`Ymf825Bus::reset_hardware`].
    pub fn reset_software(&mut self) -> Result<()> {
        self.bus.write(reg::DRIVE_POWER, 0x01)?;
        self.bus.write(reg::AP, 0x0E)?;
        std::thread::sleep(SETTLE);

        self.bus.write(reg::CLKE, 0x01)?;
        self.bus.write(reg::ALRST, 0x00)?;
        self.bus.write(reg::SOFT_RESET, 0xA3)?;
        std::thread::sleep(SETTLE);
        self.bus.write(reg::SOFT_RESET, 0x00)?;
        std::thread::sleep(RESET_SETTLE);

        // Analog blocks come back up in two steps.
        self.bus.write(reg::AP, 0x04)?;
        std::thread::sleep(SETTLE);
        self.bus.write(reg::AP, 0x00)?;

        self.set_master_volume(0x3C)?;
        self.bus.write(reg::INTERPOLATION, 0x3F)?;
        self.bus.write(reg::MUTE_TIME, 0x00)?;
        self.set_analog_gain(0x01)?;

        self.bus.write(reg::SEQUENCER_SETTING, SEQUENCER_STOP)?;
        std::thread::sleep(SEQUENCER_SETTLE);
        self.bus.write(reg::SEQUENCER_SETTING, 0x00)?;
        self.bus.write(reg::SEQUENCER_VOLUME, 0xF8)?;
        self.bus.write(reg::SEQUENCER_SIZE, 0x00)?;
        self.bus.write(reg::MS_S_HIGH, 0x40)?;
        self.bus.write(reg::MS_S_LOW, 0x00)?;

        log::debug!("power-up register sequence complete");
        Ok(())
    }

    /// Sets the master volume, 0 through 63.
    pub fn set_master_volume(&mut self, volume: u8) -> Result<()> {
        if volume > 0x3F {
            return Err(Ymf825Error::InvalidParameter);
        }
        self.bus.write(reg::MASTER_VOLUME, volume << 2)
    }

    /// Sets the speaker amplifier gain, 0 through 3.
    pub fn set_analog_gain(&mut self, gain: u8) -> Result<()> {
        if gain > 0x03 {
            return Err(Ymf825Error::InvalidParameter);
        }
        self.bus.write(reg::GAIN, gain)
    }

    /// Sets the channel volume of one voice, 0 through 31.
    pub fn set_voice_volume(&mut self, voice: u8, volume: u8) -> Result<()> {
        if voice > 0x0F || volume > 0x1F {
            return Err(Ymf825Error::InvalidParameter);
        }
        self.bus.write(reg::VOICE_NUM, voice)?;
        self.bus.write(reg::VOICE_VOLUME, volume << 2)
    }

    /// Loads a tone data block into the synthesizer.
    ///
    /// `data` is the complete block as laid out in the datasheet: a
    /// header byte giving the tone count, the 30-byte voice definitions
    /// and the terminating bytes. The sequencer is stopped and its FIFO
    /// flushed before the block goes out in a single burst.
    pub fn set_tone_data(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() || data.len() > MAX_TONE_DATA_LEN {
            return Err(Ymf825Error::InvalidParameter);
        }
        self.bus.write(reg::SEQUENCER_SETTING, SEQUENCER_STOP)?;
        std::thread::sleep(SETTLE);
        self.bus.write(reg::SEQUENCER_SETTING, 0x00)?;
        self.bus.burst_write(reg::CONTENTS_DATA, data)
    }

    /// Starts a note on `voice` (0 through 15) at the given octave
    /// block (0 through 7) and 10-bit F-number, with tone number 0.
    ///
    /// [`pitch`] converts a MIDI note number into the block and
    /// F-number pair.
    #[allow(clippy::cast_possible_truncation)]
    pub fn note_on(&mut self, voice: u8, block: u8, fnum: u16) -> Result<()> {
        if voice > 0x0F || block > 0x07 || fnum > 0x3FF {
            return Err(Ymf825Error::InvalidParameter);
        }
        self.bus.write(reg::VOICE_NUM, voice)?;
        self.bus.write(reg::FNUM_HIGH, ((fnum >> 4) as u8 & 0x38) | block)?;
        self.bus.write(reg::FNUM_LOW, fnum as u8 & 0x7F)?;
        self.bus.write(reg::KEY_ON, KEY_ON_FLAG)
    }

    /// Releases the note playing on `voice`.
    pub fn note_off(&mut self, voice: u8) -> Result<()> {
        if voice > 0x0F {
            return Err(Ymf825Error::InvalidParameter);
        }
        self.bus.write(reg::VOICE_NUM, voice)?;
        self.bus.write(reg::KEY_ON, 0x00)
    }

    /// Releases every voice at once.
    pub fn all_key_off(&mut self) -> Result<()> {
        self.bus.write(reg::SEQUENCER_SETTING, ALL_KEY_OFF)?;
        self.bus.write(reg::SEQUENCER_SETTING, 0x00)
    }
}

/// Converts a MIDI note number into the chip's octave block and 10-bit
/// F-number.
///
/// The synthesizer derives a frequency as
/// `fnum * 48000 / 2^(21 - block)`; this picks the lowest block that
/// keeps the F-number within 10 bits, which preserves the most pitch
/// resolution. Notes too high to represent saturate at the top of
/// block 7.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn pitch(midi_note: u8) -> (u8, u16) {
    let freq = 440.0 * 2.0_f64.powf((f64::from(midi_note) - 69.0) / 12.0);
    let mut block = 0u8;
    let mut fnum = freq * 2.0_f64.powi(21) / 48_000.0;
    while fnum > 1023.0 && block < 7 {
        fnum /= 2.0;
        block += 1;
    }
    (block, (fnum.round() as u16).min(1023))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusCounters;

    #[derive(Default)]
    struct MockBus {
        writes: Vec<(u8, u8)>,
        bursts: Vec<(u8, Vec<u8>)>,
        read_value: u8,
    }

    impl Ymf825Bus for MockBus {
        fn write(&mut self, address: u8, data: u8) -> Result<()> {
            self.writes.push((address, data));
            Ok(())
        }

        fn burst_write(&mut self, address: u8, data: &[u8]) -> Result<()> {
            self.bursts.push((address, data.to_vec()));
            Ok(())
        }

        fn read(&mut self, _address: u8) -> Result<u8> {
            Ok(self.read_value)
        }

        fn set_target(&mut self, _mask: u8) -> Result<()> {
            Ok(())
        }

        fn reset_hardware(&mut self) -> Result<()> {
            Ok(())
        }

        fn counters(&self) -> BusCounters {
            BusCounters::default()
        }
    }

    fn test_driver() -> Ymf825Driver<MockBus> {
        Ymf825Driver::new(MockBus {
            read_value: 0x01,
            ..MockBus::default()
        })
    }

    #[test]
    fn power_up_register_trace() {
        let mut driver = test_driver();
        driver.reset_software().unwrap();
        assert_eq!(
            driver.bus().writes,
            [
                (reg::DRIVE_POWER, 0x01),
                (reg::AP, 0x0E),
                (reg::CLKE, 0x01),
                (reg::ALRST, 0x00),
                (reg::SOFT_RESET, 0xA3),
                (reg::SOFT_RESET, 0x00),
                (reg::AP, 0x04),
                (reg::AP, 0x00),
                (reg::MASTER_VOLUME, 0xF0),
                (reg::INTERPOLATION, 0x3F),
                (reg::MUTE_TIME, 0x00),
                (reg::GAIN, 0x01),
                (reg::SEQUENCER_SETTING, 0xF6),
                (reg::SEQUENCER_SETTING, 0x00),
                (reg::SEQUENCER_VOLUME, 0xF8),
                (reg::SEQUENCER_SIZE, 0x00),
                (reg::MS_S_HIGH, 0x40),
                (reg::MS_S_LOW, 0x00),
            ]
        );
    }

    #[test]
    fn availability_check_reads_the_id_register() {
        let mut driver = test_driver();
        driver.check_available().unwrap();

        let mut driver = Ymf825Driver::new(MockBus::default());
        assert_eq!(driver.check_available(), Err(Ymf825Error::DeviceNotFound));
    }

    #[test]
    fn tone_data_is_bounded_and_stops_the_sequencer() {
        let mut driver = test_driver();
        assert_eq!(
            driver.set_tone_data(&[]),
            Err(Ymf825Error::InvalidParameter)
        );
        assert_eq!(
            driver.set_tone_data(&vec![0u8; MAX_TONE_DATA_LEN + 1]),
            Err(Ymf825Error::InvalidParameter)
        );
        assert!(driver.bus().writes.is_empty());

        driver.set_tone_data(&[0x81, 0x80, 0x03, 0x81, 0x80]).unwrap();
        assert_eq!(
            driver.bus().writes,
            [
                (reg::SEQUENCER_SETTING, 0xF6),
                (reg::SEQUENCER_SETTING, 0x00),
            ]
        );
        assert_eq!(
            driver.bus().bursts,
            [(reg::CONTENTS_DATA, vec![0x81, 0x80, 0x03, 0x81, 0x80])]
        );
    }

    #[test]
    fn notes_key_on_and_off() {
        let mut driver = test_driver();
        driver.note_on(0, 5, 601).unwrap();
        driver.note_off(0).unwrap();
        assert_eq!(
            driver.bus().writes,
            [
                (reg::VOICE_NUM, 0x00),
                (reg::FNUM_HIGH, 0x25),
                (reg::FNUM_LOW, 0x59),
                (reg::KEY_ON, 0x40),
                (reg::VOICE_NUM, 0x00),
                (reg::KEY_ON, 0x00),
            ]
        );
    }

    #[test]
    fn note_arguments_are_validated() {
        let mut driver = test_driver();
        assert_eq!(
            driver.note_on(16, 0, 0),
            Err(Ymf825Error::InvalidParameter)
        );
        assert_eq!(
            driver.note_on(0, 8, 0),
            Err(Ymf825Error::InvalidParameter)
        );
        assert_eq!(
            driver.note_on(0, 0, 1024),
            Err(Ymf825Error::InvalidParameter)
        );
        assert_eq!(
            driver.set_master_volume(64),
            Err(Ymf825Error::InvalidParameter)
        );
        assert!(driver.bus().writes.is_empty());
    }

    #[test]
    fn pitch_of_concert_a() {
        assert_eq!(pitch(69), (5, 601));
    }

    #[test]
    fn pitch_octave_doubles_the_block() {
        let (block, fnum) = pitch(69);
        assert_eq!(pitch(81), (block + 1, fnum));
    }

    #[test]
    fn pitch_rises_within_a_block() {
        let (block_c, fnum_c) = pitch(60);
        let (block_cs, fnum_cs) = pitch(61);
        assert_eq!(block_c, block_cs);
        assert!(fnum_cs > fnum_c);
    }
}
