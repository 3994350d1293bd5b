//! Plays a short scale on a YMF825 wired to an FTDI bridge.
//!
//! ```text
//! play --list                      # enumerate connected bridges
//! play --index 0 --cs 0x08        # open a bridge and play
//! play --serve 127.0.0.1:9825     # share the bus with other processes
//! play --connect 127.0.0.1:9825   # play through a running server
//! ```

use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use clap::Parser;
use ymf825::{
    list_devices, pitch, BusServer, SpiBus, SpiConfig, StreamBus, Ymf825Bus, Ymf825Driver,
};

/// The demo tone: one 30-byte FM voice, with the count header and the
/// terminator bytes the tone port expects.
const TONE_DATA: [u8; 35] = [
    0x81, // one tone
    0x01, 0x85, //
    0x00, 0x7F, 0xF4, 0xBB, 0x00, 0x10, 0x40, //
    0x00, 0xAF, 0xA0, 0x0E, 0x03, 0x10, 0x40, //
    0x00, 0x2F, 0xF3, 0x9B, 0x00, 0x20, 0x41, //
    0x00, 0xAF, 0xA0, 0x0E, 0x01, 0x10, 0x40, //
    0x80, 0x03, 0x81, 0x80, // terminator
];

/// C major scale, one octave up from middle C.
const SCALE: [u8; 8] = [60, 62, 64, 65, 67, 69, 71, 72];

/// Parse a string as a hex or decimal pin mask
fn parse_mask(s: &str) -> Result<u8, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).map_err(|e| format!("invalid hex value: {e}"))
    } else {
        s.parse::<u8>().map_err(|e| format!("invalid number: {e}"))
    }
}

/// Default log filter for the given -v count, unless RUST_LOG overrides it
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[derive(Parser)]
#[command(name = "play")]
#[command(author, version, about = "Play a short scale on a YMF825", long_about = None)]
struct Cli {
    /// List connected devices and exit
    #[arg(short, long)]
    list: bool,

    /// Device index to open
    #[arg(short, long, default_value_t = 0)]
    index: u32,

    /// Chip-select pin mask (ADBUS GPIO bit, hex or decimal)
    #[arg(short, long, default_value = "0x08", value_parser = parse_mask)]
    cs: u8,

    /// Serve the bus to other processes instead of playing
    #[arg(long, value_name = "ADDR", conflicts_with = "connect")]
    serve: Option<String>,

    /// Play through a bus server instead of local hardware
    #[arg(long, value_name = "ADDR")]
    connect: Option<String>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.verbose)),
    )
    .init();

    if cli.list {
        let devices = list_devices()?;
        if devices.is_empty() {
            println!("no devices found");
        }
        for info in &devices {
            println!(
                "{}: {} (serial {}, {}{})",
                info.index(),
                info.description(),
                info.serial_number(),
                if info.is_open() { "in use" } else { "available" },
                if info.has_mpsse() { "" } else { ", no MPSSE" },
            );
        }
        return Ok(());
    }

    let config = SpiConfig {
        cs_pins: cli.cs,
        ..SpiConfig::default()
    };

    if let Some(addr) = &cli.serve {
        let bus = SpiBus::open(cli.index, &config)?;
        let listener = TcpListener::bind(addr.as_str())?;
        log::info!("serving bus on {}", listener.local_addr()?);
        BusServer::new(bus).run(&listener)?;
        return Ok(());
    }

    if let Some(addr) = &cli.connect {
        let mut bus = StreamBus::connect(addr.as_str())?;
        bus.check_available()?;
        play(bus, cli.cs)?;
    } else {
        play(SpiBus::open(cli.index, &config)?, cli.cs)?;
    }
    Ok(())
}

fn play(mut bus: impl Ymf825Bus, cs: u8) -> ymf825::Result<()> {
    bus.set_target(cs)?;
    bus.reset_hardware()?;

    let mut synth = Ymf825Driver::new(bus);
    synth.check_available()?;
    synth.reset_software()?;
    synth.set_tone_data(&TONE_DATA)?;
    synth.set_voice_volume(0, 0x15)?;

    for note in SCALE {
        let (block, fnum) = pitch(note);
        log::debug!("note {note}: block {block}, fnum {fnum}");
        synth.note_on(0, block, fnum)?;
        thread::sleep(Duration::from_millis(280));
        synth.note_off(0)?;
        thread::sleep(Duration::from_millis(20));
    }

    let counters = synth.bus().counters();
    println!(
        "{} writes ({} bytes), {} bursts ({} bytes), {} reads, {} errors",
        counters.write.commands,
        counters.write.bytes,
        counters.burst_write.commands,
        counters.burst_write.bytes,
        counters.read.commands,
        counters.write.errors + counters.burst_write.errors + counters.read.errors,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{log_filter, parse_mask};

    #[test]
    fn verbosity_loosens_the_filter() {
        assert_eq!(log_filter(0), "info");
        assert_eq!(log_filter(1), "debug");
        assert_eq!(log_filter(2), "trace");
        assert_eq!(log_filter(9), "trace");
    }

    #[test]
    fn masks_parse_in_hex_and_decimal() {
        assert_eq!(parse_mask("0x08"), Ok(0x08));
        assert_eq!(parse_mask("0X10"), Ok(0x10));
        assert_eq!(parse_mask("8"), Ok(8));
        assert!(parse_mask("0x1FF").is_err());
        assert!(parse_mask("pin3").is_err());
    }
}
