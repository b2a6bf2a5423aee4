use log::trace;
use rusb::{Device, GlobalContext};

use crate::{Chip, Result};

/// Lists attached bridges whose USB ids identify them as I2C-capable CH341/CH347 chips. This
/// doesn't involve the vendor library, so it works for diagnosing a missing driver.
pub fn devices() -> Result<Vec<(Chip, Device<GlobalContext>)>> {
    let mut found = Vec::new();
    for device in rusb::devices()?.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(d) => d,
            Err(e) => {
                trace!("skipping {:?}: {}", device, e);
                continue;
            }
        };
        if let Some(chip) = chip_for_ids(descriptor.vendor_id(), descriptor.product_id()) {
            found.push((chip, device));
        }
    }
    Ok(found)
}

fn chip_for_ids(vendor_id: u16, product_id: u16) -> Option<Chip> {
    Chip::ALL
        .into_iter()
        .find(|chip| chip.usb_ids().contains(&(vendor_id, product_id)))
}
