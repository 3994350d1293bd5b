use crate::{
    ffi::{self, with_global_lock},
    mpsse, try_ft, Device, Result,
};

/// Summary of one entry in the driver's device table.
///
/// Produced by [`list_devices`]. The `index` is the entry's position in the
/// table and is what [`DeviceInfo::open`] and [`Device::open`] consume. The
/// table is rebuilt on every call, so an index is only meaningful until
/// devices are plugged or unplugged.
pub struct DeviceInfo {
    index: u32,
    flags: u32,
    device_type: u32,
    id: u32,
    location_id: u32,
    serial_number: String,
    description: String,
}

impl DeviceInfo {
    /// Open the device described by this entry.
    pub fn open(&self) -> Result<Device> {
        Device::open(self.index)
    }

    /// Position of this entry in the device table.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Whether some process already holds the device open.
    pub fn is_open(&self) -> bool {
        self.flags & ffi::FT_FLAGS_OPENED != 0
    }

    /// Whether the device is enumerated as a USB hi-speed device.
    pub fn is_hispeed(&self) -> bool {
        self.flags & ffi::FT_FLAGS_HISPEED != 0
    }

    /// Whether the device reports a product ID with an MPSSE engine
    /// (FT2232H or FT232H), and so can run the SPI bus.
    #[allow(clippy::cast_possible_truncation)]
    pub fn has_mpsse(&self) -> bool {
        (self.id >> 16) as u16 == mpsse::FTDI_VID && mpsse::MPSSE_PIDS.contains(&(self.id as u16))
    }

    /// Raw driver flags word.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Raw device type code as reported by the driver.
    pub fn device_type(&self) -> u32 {
        self.device_type
    }

    /// USB vendor and product ID word.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// USB location of the device.
    pub fn location_id(&self) -> u32 {
        self.location_id
    }

    /// Serial number string.
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Product description string.
    pub fn description(&self) -> &str {
        &self.description
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_node(index: u32, info: &ffi::FT_DEVICE_LIST_INFO_NODE) -> Self {
        // SAFETY: the strings are guaranteed to be non-null and null-terminated
        let serial_number = unsafe { std::ffi::CStr::from_ptr(info.SerialNumber.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        let description = unsafe { std::ffi::CStr::from_ptr(info.Description.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        Self {
            index,
            flags: info.Flags as u32,
            device_type: info.Type as u32,
            id: info.ID as u32,
            location_id: info.LocId as u32,
            serial_number,
            description,
        }
    }
}

/// Number of devices currently in the driver's device table.
pub fn device_count() -> Result<usize> {
    with_global_lock(create_device_info_list)
}

/// List the devices currently known to the driver.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    // global lock needed to prevent concurrent access to the driver's internal device table
    let devices = with_global_lock(|| -> Result<_> {
        let n_devices = create_device_info_list()?;
        // output parameter is guaranteed to be exactly equal to `n_devices`
        let mut figuratively_garbage: ffi::DWORD = 0;
        let mut devices: Vec<ffi::FT_DEVICE_LIST_INFO_NODE> = Vec::with_capacity(n_devices);
        try_ft!(unsafe {
            ffi::FT_GetDeviceInfoList(
                devices.as_mut_ptr(),
                std::ptr::addr_of_mut!(figuratively_garbage),
            )
        })?;
        // SAFETY: the number of devices is known to be correct
        // and the device buffer is fully populated.
        unsafe { devices.set_len(n_devices) };

        Ok(devices)
    })?;

    Ok((0u32..)
        .zip(devices.iter())
        .map(|(index, info)| DeviceInfo::from_node(index, info))
        .collect())
}

fn create_device_info_list() -> Result<usize> {
    let mut num_devices: ffi::DWORD = 0;
    try_ft!(unsafe { ffi::FT_CreateDeviceInfoList(std::ptr::addr_of_mut!(num_devices)) })?;
    Ok(num_devices as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with_id(id: u32) -> DeviceInfo {
        DeviceInfo {
            index: 0,
            flags: 0,
            device_type: 0,
            id,
            location_id: 0,
            serial_number: String::new(),
            description: String::new(),
        }
    }

    #[test]
    fn mpsse_capability_follows_the_product_id() {
        assert!(info_with_id(0x0403_6014).has_mpsse()); // FT232H
        assert!(info_with_id(0x0403_6010).has_mpsse()); // FT2232H
        assert!(!info_with_id(0x0403_6001).has_mpsse()); // FT232R, no MPSSE
        assert!(!info_with_id(0x1234_6014).has_mpsse()); // not FTDI
    }
}
