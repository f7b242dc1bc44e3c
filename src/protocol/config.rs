//! Protocol constants for the satellite command link.

use std::time::Duration;

// ============================================================================
// GATT Service
// ============================================================================
//
// Nothing in this crate opens the radio. Host `Link` implementations use these
// to find the characteristics that carry frames.

/// UART-style service exposed by the device.
pub const UART_SERVICE_UUID: &str = "6E400001-B5A3-F393-E0A9-E50E24DCCA9E";

/// Characteristic the host writes frames to.
pub const UART_RX_CHARACTERISTIC_UUID: &str = "6E400002-B5A3-F393-E0A9-E50E24DCCA9E";

/// Characteristic the device notifies replies on.
pub const UART_TX_CHARACTERISTIC_UUID: &str = "6E400003-B5A3-F393-E0A9-E50E24DCCA9E";

// ============================================================================
// Timeouts
// ============================================================================

/// Time to wait for the reply to one command.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on connect and disconnect.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Scan window for the bootloader after a model B device reboots.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after the device acknowledges boot mode.
pub const BOOT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

// ============================================================================
// Frame Layout
// ============================================================================

/// Command frame header: start, opcode, 4 address bytes, length.
pub const FRAME_HEADER_LEN: usize = 7;

/// Reply header: status, opcode, address, count.
pub const RESPONSE_HEADER_LEN: usize = 4;

/// Largest payload a single frame can describe.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Largest chunk the link accepts in one write.
pub const CHUNK_SIZE: usize = 240;

/// First reply byte of every successful register response.
pub const RESPONSE_SUCCESS: u8 = 0x00;

// ============================================================================
// Boot Mode Opcodes
// ============================================================================

/// Start byte of frames sent while the device is in boot mode.
pub const BOOT_MODE_START: u8 = 0x24;

/// Opcode carrying a slice of the firmware image.
pub const FIRMWARE_CHUNK_OPCODE: u8 = 0x01;

/// Opcode carrying a slice of the init metadata.
pub const METADATA_CHUNK_OPCODE: u8 = 0x04;

// ============================================================================
// Raw Register Opcodes
// ============================================================================

/// Start byte of raw register frames.
pub const RAW_START_MARK: u8 = 0x21;

/// Read `count` bytes starting at an address.
pub const REGISTER_READ_OPCODE: u8 = 0x81;

/// Write a value at an address.
pub const REGISTER_WRITE_OPCODE: u8 = 0x01;

/// Commit written registers to flash.
pub const APPLY_OPCODE: u8 = 0xEE;

// ============================================================================
// Text Commands
// ============================================================================

pub const PIN_COMMAND_PREFIX: &str = "pin.";
pub const PIN_OK: &str = "pin.ok";
pub const BOOT_COMMAND: &str = "boot";
pub const BOOT_OK: &str = "boot.ok";
pub const SET_RAW_COMMAND: &str = "setraw";
pub const SET_RAW_OK: &str = "setraw.ok";
pub const SERIAL_COMMAND: &str = "serial";
pub const SERIAL_REPLY_PREFIX: &str = "ser.";
pub const VERSION_COMMAND: &str = "version";
pub const SOFTWARE_VERSION_TAG: &str = "sw:";

/// Credential used for model B updates when none is configured.
pub const MASTER_CREDENTIAL: &str = "master";

/// Advertised name prefix, followed by the last four serial digits.
pub const DEVICE_NAME_PREFIX: &str = "SatelliteOnline";

// ============================================================================
// Firmware File Names
// ============================================================================

/// Prefix of images installed in-band over the command link.
pub const MODEL_A_FIRMWARE_PREFIX: &str = "DfuAppOnline_";

/// Prefix of images handed to the external bootloader.
pub const MODEL_B_FIRMWARE_PREFIX: &str = "AppOnline_";

pub const FIRMWARE_EXTENSION: &str = ".zip";
