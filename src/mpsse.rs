//! FTDI MPSSE protocol constants.
//!
//! Based on the FT232H/FT2232H datasheets and FTDI application note AN_108.

/// Write bytes on negative clock edge (SPI mode 0)
pub const MPSSE_DO_WRITE: u8 = 0x10;

/// Read bytes on positive clock edge (SPI mode 0)
pub const MPSSE_DO_READ: u8 = 0x20;

/// Write on negative clock edge
pub const MPSSE_WRITE_NEG: u8 = 0x01;

/// Clock bytes out, MSB first, falling edge
pub const SPI_BYTE_OUT: u8 = MPSSE_DO_WRITE | MPSSE_WRITE_NEG;

/// Clock bytes out while reading bytes in
pub const SPI_BYTE_IO: u8 = SPI_BYTE_OUT | MPSSE_DO_READ;

/// Set data bits low byte (ADBUS)
pub const SET_BITS_LOW: u8 = 0x80;

/// Set data bits high byte (ACBUS)
pub const SET_BITS_HIGH: u8 = 0x82;

/// Disable loopback mode
pub const LOOPBACK_END: u8 = 0x85;

/// Set clock divisor
pub const TCK_DIVISOR: u8 = 0x86;

/// Send immediate (flush response buffer to the host)
pub const SEND_IMMEDIATE: u8 = 0x87;

/// Disable divide-by-5 prescaler (60 MHz base clock)
pub const DIS_DIV_5: u8 = 0x8A;

// Pin assignments (low byte):
//
// ADBUS0 is SK (clock), ADBUS1 is DO (MOSI), ADBUS2 is DI (MISO),
// ADBUS3 through ADBUS7 carry chip-select lines.

/// ADBUS direction mask: everything is an output except DI.
pub const CS_DIRECTION: u8 = 0xFB;

/// ACBUS direction mask: all outputs. The reset line lives here.
pub const AUX_DIRECTION: u8 = 0xFF;

/// Default clock divisor value (10 MHz at the 60 MHz base clock:
/// 60 MHz / ((1 + 2) * 2)).
pub const DEFAULT_DIVISOR: u16 = 2;

/// FTDI USB vendor ID.
pub const FTDI_VID: u16 = 0x0403;

/// Product IDs of the MPSSE-capable parts this driver targets
/// (FT2232H and FT232H).
pub const MPSSE_PIDS: [u16; 2] = [0x6010, 0x6014];
