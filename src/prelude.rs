//! Public prelude of the crate containing the most commonly used types and functions.

pub use crate::{
    list_devices, pitch, BusServer, Device, DeviceInfo, Result, SpiBus, SpiConfig, StreamBus,
    Ymf825Bus, Ymf825Driver, Ymf825Error,
};
