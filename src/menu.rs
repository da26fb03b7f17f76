//! Interactive rename menu. Runs between monitoring cycles, never inside
//! one, so the change detector can always make forward progress without
//! blocking on user input.

use std::io::{self, BufRead, Write};

use crate::device::Device;
use crate::monitor::ChangeDetector;
use crate::vendor::VendorLookup;

/// Print the live device table, one row per device.
pub fn print_device_table(devices: &[Device]) {
    println!("\nThe connected device list on your LAN:\n");
    for device in devices {
        println!(
            "Device {}: {} {} {}",
            device.id_display(),
            device.ip,
            device.mac_display(),
            device.display_name()
        );
    }
    println!();
}

/// Show the device list and offer renames until the user declines. Each
/// prompt round is a fixed menu over the current live snapshot.
pub async fn run<V: VendorLookup>(detector: &mut ChangeDetector<V>) -> io::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print_device_table(detector.live());

        print!("To change the name of a device, input the device #. Or enter 'n': ");
        io::stdout().flush()?;
        let Some(input) = lines.next().transpose()? else {
            // stdin closed; nothing more to ask
            return Ok(());
        };
        let input = input.trim();

        if input.eq_ignore_ascii_case("n") || input.is_empty() {
            return Ok(());
        }
        let Ok(id) = input.parse::<i64>() else {
            println!("invalid input");
            continue;
        };
        if !detector.live().iter().any(|d| d.id == Some(id)) {
            println!("invalid input");
            continue;
        }

        print!("Enter new name for device #{id} or enter 'api' to download a name: ");
        io::stdout().flush()?;
        let Some(name) = lines.next().transpose()? else {
            return Ok(());
        };
        let name = name.trim();

        if name.eq_ignore_ascii_case("api") {
            match detector.rename_from_vendor(id).await {
                Some(name) => println!("{name} is the new name of that device."),
                None => println!("No manufacturer name available for device #{id}."),
            }
        } else if name.is_empty() {
            println!("invalid input");
        } else if detector.rename_device(id, name) {
            println!("{name} is the new name of that device.");
        } else {
            println!("Could not rename device #{id}.");
        }
    }
}
