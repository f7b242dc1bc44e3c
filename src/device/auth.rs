//! PIN authentication and boot mode entry.

use log::info;

use crate::error::{UpdateError, UpdateResult};
use crate::protocol::config::{BOOT_COMMAND, BOOT_OK, PIN_COMMAND_PREFIX, PIN_OK};
use crate::transport::command::{reply_text, CommandOutcome, CommandTransport};
use crate::transport::link::Link;

/// Present `credential` to the device. The reply must contain `pin.ok`.
pub async fn authenticate<L: Link>(
    transport: &mut CommandTransport<L>,
    credential: &str,
) -> UpdateResult<()> {
    let command = format!("{}{}", PIN_COMMAND_PREFIX, credential);
    match transport.send_text_expect(&command, PIN_OK).await {
        CommandOutcome::Success(_) => {
            info!("Authenticated");
            Ok(())
        }
        CommandOutcome::Rejected(reply) => Err(UpdateError::Authentication {
            reason: format!("device replied '{}'", reply_text(&reply)),
        }),
        other => other.into_result("pin").map(|_| ()),
    }
}

/// Ask the device to enter boot mode. The reply must contain `boot.ok`.
pub async fn enter_boot_mode<L: Link>(transport: &mut CommandTransport<L>) -> UpdateResult<()> {
    match transport.send_text_expect(BOOT_COMMAND, BOOT_OK).await {
        CommandOutcome::Success(_) => {
            info!("Device entered boot mode");
            Ok(())
        }
        CommandOutcome::Rejected(reply) => Err(UpdateError::Boot {
            reason: format!("device replied '{}'", reply_text(&reply)),
        }),
        other => other.into_result(BOOT_COMMAND).map(|_| ()),
    }
}
