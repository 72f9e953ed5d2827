//! Primary dispatch store backed by redb.
//!
//! Tables:
//! - `devices`: device_id -> DeviceRecord (bincode)
//! - `commands`: (device_id, command_id) -> CommandRecord (bincode), so a
//!   range scan over one device yields pending commands in FIFO order
//! - `command_index`: command_id -> device_id, for id-only lookups
//! - `operators`: username -> OperatorRecord (bincode)
//! - `activity_log`: log_id -> LogRecord (bincode), append-only
//! - `counters`: name -> next value, bumped inside the same transaction as
//!   the insert that consumes it

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEVICES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("devices");
const COMMANDS_TABLE: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("commands");
const COMMAND_INDEX_TABLE: TableDefinition<u64, &str> = TableDefinition::new("command_index");
const OPERATORS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("operators");
const ACTIVITY_LOG_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("activity_log");
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

const NEXT_COMMAND_ID: &str = "next_command_id";
const NEXT_LOG_ID: &str = "next_log_id";

/// A registered device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceRecord {
    /// Unique device identifier, immutable after creation.
    pub device_id: String,
    /// Hex sha-256 of the device secret. Cleartext is never stored.
    pub secret_hash: String,
    /// Username of the operator that registered the device.
    pub owner: String,
    /// Registration timestamp (unix seconds).
    pub created_at: i64,
    /// Updated on every authenticated poll or check-in.
    pub last_seen: i64,
    /// Updated on successful command delivery.
    pub last_request_time: Option<i64>,
}

/// A queued command. Exists from enqueue until delivery, then is destroyed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandRecord {
    /// Globally monotonic id, assigned at enqueue.
    pub id: u64,
    pub device_id: String,
    /// Opaque payload, delivered verbatim.
    pub payload: String,
    pub created_at: i64,
}

/// An operator account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorRecord {
    pub id: String,
    /// Unique login name.
    pub username: String,
    /// Bcrypt hash of the password.
    pub password_hash: String,
    pub email: Option<String>,
    pub created_at: i64,
}

/// One append-only activity log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub id: u64,
    pub timestamp: i64,
    pub device_id: String,
    /// Free-form action: "check-in", "command-delivered", ...
    pub action: String,
    pub command_id: Option<u64>,
}

/// Dispatch store over a single redb database.
pub struct DispatchStore {
    db: Database,
}

impl DispatchStore {
    /// Open or create a dispatch store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = if path_ref.exists() {
            Database::open(path_ref)?
        } else {
            Database::create(path_ref)?
        };

        // Open all tables once so later read transactions never hit a
        // missing-table error on a fresh database.
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(DEVICES_TABLE)?;
            let _ = write_txn.open_table(COMMANDS_TABLE)?;
            let _ = write_txn.open_table(COMMAND_INDEX_TABLE)?;
            let _ = write_txn.open_table(OPERATORS_TABLE)?;
            let _ = write_txn.open_table(ACTIVITY_LOG_TABLE)?;
            let _ = write_txn.open_table(COUNTERS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // ========== Devices ==========

    /// Insert a new device. Fails with `AlreadyExists` and no mutation when
    /// the id is taken; the existence check and insert share one transaction.
    pub fn create_device(&self, record: &DeviceRecord) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DEVICES_TABLE)?;
            if table.get(record.device_id.as_str())?.is_some() {
                return Err(Error::AlreadyExists(record.device_id.clone()));
            }
            let bytes = bincode::serialize(record)?;
            table.insert(record.device_id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Insert or overwrite a device row. Used by replica replay.
    pub fn put_device(&self, record: &DeviceRecord) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DEVICES_TABLE)?;
            let bytes = bincode::serialize(record)?;
            table.insert(record.device_id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_device(&self, device_id: &str) -> Result<Option<DeviceRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DEVICES_TABLE)?;
        match table.get(device_id)? {
            Some(value) => Ok(Some(bincode::deserialize(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DEVICES_TABLE)?;
        let mut devices = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            devices.push(bincode::deserialize(value.value())?);
        }
        Ok(devices)
    }

    /// Update liveness timestamps. `last_request_time` is only written when
    /// `requested` is set. Unknown device is a no-op (`false`), not an error.
    pub fn touch_device(
        &self,
        device_id: &str,
        seen: i64,
        requested: Option<i64>,
    ) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let touched = {
            let mut table = write_txn.open_table(DEVICES_TABLE)?;
            let record = match table.get(device_id)? {
                Some(value) => {
                    let mut record: DeviceRecord = bincode::deserialize(value.value())?;
                    record.last_seen = seen;
                    if let Some(ts) = requested {
                        record.last_request_time = Some(ts);
                    }
                    Some(record)
                }
                None => None,
            };
            match record {
                Some(record) => {
                    let bytes = bincode::serialize(&record)?;
                    table.insert(device_id, bytes.as_slice())?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(touched)
    }

    // ========== Commands ==========

    /// Append a command to a device's queue, assigning the next global id.
    /// Fails with `NotFound` when the device is unknown.
    pub fn enqueue_command(
        &self,
        device_id: &str,
        payload: &str,
        created_at: i64,
    ) -> Result<CommandRecord> {
        let write_txn = self.db.begin_write()?;
        let record = {
            let devices = write_txn.open_table(DEVICES_TABLE)?;
            if devices.get(device_id)?.is_none() {
                return Err(Error::NotFound(format!("device {}", device_id)));
            }
            drop(devices);

            let id = Self::next_seq(&write_txn, NEXT_COMMAND_ID)?;
            let record = CommandRecord {
                id,
                device_id: device_id.to_string(),
                payload: payload.to_string(),
                created_at,
            };
            Self::insert_command_row(&write_txn, &record)?;
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    /// Insert a command row preserving its id. Used by replica replay; keeps
    /// the replica's id counter ahead of everything it has seen.
    pub fn put_command(&self, record: &CommandRecord) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            Self::insert_command_row(&write_txn, record)?;
            let mut counters = write_txn.open_table(COUNTERS_TABLE)?;
            let next = counters.get(NEXT_COMMAND_ID)?.map(|v| v.value()).unwrap_or(1);
            if record.id >= next {
                counters.insert(NEXT_COMMAND_ID, record.id + 1)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Atomically pop the oldest pending command for a device.
    ///
    /// Selection and deletion happen inside one write transaction, and redb
    /// admits a single writer at a time, so two concurrent callers can never
    /// observe and remove the same head row. Empty queue returns `None` with
    /// no side effects.
    pub fn dequeue_next(&self, device_id: &str) -> Result<Option<CommandRecord>> {
        let write_txn = self.db.begin_write()?;
        let popped = {
            let mut commands = write_txn.open_table(COMMANDS_TABLE)?;
            let head: Option<CommandRecord> = {
                let mut range = commands.range((device_id, 0u64)..=(device_id, u64::MAX))?;
                match range.next() {
                    Some(entry) => {
                        let (_key, value) = entry?;
                        Some(bincode::deserialize(value.value())?)
                    }
                    None => None,
                }
            };
            match head {
                Some(record) => {
                    commands.remove((device_id, record.id))?;
                    let mut index = write_txn.open_table(COMMAND_INDEX_TABLE)?;
                    index.remove(record.id)?;
                    Some(record)
                }
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(popped)
    }

    /// Pending commands for a device, oldest first. Read-only.
    pub fn list_pending(&self, device_id: &str) -> Result<Vec<CommandRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COMMANDS_TABLE)?;
        let mut pending = Vec::new();
        for entry in table.range((device_id, 0u64)..=(device_id, u64::MAX))? {
            let (_key, value) = entry?;
            pending.push(bincode::deserialize(value.value())?);
        }
        Ok(pending)
    }

    /// Remove a command by id, returning the device it belonged to, or
    /// `None` when it no longer exists -- delivery and cancellation
    /// legitimately race.
    pub fn remove_command(&self, command_id: u64) -> Result<Option<String>> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut index = write_txn.open_table(COMMAND_INDEX_TABLE)?;
            let device_id = index.remove(command_id)?.map(|v| v.value().to_string());
            match device_id {
                Some(device_id) => {
                    let mut commands = write_txn.open_table(COMMANDS_TABLE)?;
                    commands.remove((device_id.as_str(), command_id))?;
                    Some(device_id)
                }
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Delete every pending command for a device. Used by replica replay of
    /// batch replacement.
    pub fn clear_commands(&self, device_id: &str) -> Result<usize> {
        let write_txn = self.db.begin_write()?;
        let cleared = {
            let mut commands = write_txn.open_table(COMMANDS_TABLE)?;
            let ids: Vec<u64> = {
                let mut ids = Vec::new();
                for entry in commands.range((device_id, 0u64)..=(device_id, u64::MAX))? {
                    let (key, _) = entry?;
                    ids.push(key.value().1);
                }
                ids
            };
            let mut index = write_txn.open_table(COMMAND_INDEX_TABLE)?;
            let cleared = ids.len();
            for id in ids {
                commands.remove((device_id, id))?;
                index.remove(id)?;
            }
            cleared
        };
        write_txn.commit()?;
        Ok(cleared)
    }

    /// Replace a device's entire pending queue with a new batch, in one
    /// transaction: either the old set is gone and the new set is queued, or
    /// nothing changed.
    pub fn replace_commands(
        &self,
        device_id: &str,
        payloads: &[String],
        created_at: i64,
    ) -> Result<Vec<CommandRecord>> {
        let write_txn = self.db.begin_write()?;
        let records = {
            let devices = write_txn.open_table(DEVICES_TABLE)?;
            if devices.get(device_id)?.is_none() {
                return Err(Error::NotFound(format!("device {}", device_id)));
            }
            drop(devices);

            let mut commands = write_txn.open_table(COMMANDS_TABLE)?;
            let old_ids: Vec<u64> = {
                let mut ids = Vec::new();
                for entry in commands.range((device_id, 0u64)..=(device_id, u64::MAX))? {
                    let (key, _) = entry?;
                    ids.push(key.value().1);
                }
                ids
            };
            let mut index = write_txn.open_table(COMMAND_INDEX_TABLE)?;
            for id in old_ids {
                commands.remove((device_id, id))?;
                index.remove(id)?;
            }
            drop(index);
            drop(commands);

            let mut records = Vec::with_capacity(payloads.len());
            for payload in payloads {
                let id = Self::next_seq(&write_txn, NEXT_COMMAND_ID)?;
                let record = CommandRecord {
                    id,
                    device_id: device_id.to_string(),
                    payload: payload.clone(),
                    created_at,
                };
                Self::insert_command_row(&write_txn, &record)?;
                records.push(record);
            }
            records
        };
        write_txn.commit()?;
        Ok(records)
    }

    // ========== Operators ==========

    /// Insert a new operator. Fails with `AlreadyExists` when the username
    /// is taken.
    pub fn create_operator(&self, record: &OperatorRecord) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(OPERATORS_TABLE)?;
            if table.get(record.username.as_str())?.is_some() {
                return Err(Error::AlreadyExists(record.username.clone()));
            }
            let bytes = bincode::serialize(record)?;
            table.insert(record.username.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_operator(&self, username: &str) -> Result<Option<OperatorRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OPERATORS_TABLE)?;
        match table.get(username)? {
            Some(value) => Ok(Some(bincode::deserialize(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn operator_count(&self) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OPERATORS_TABLE)?;
        Ok(table.iter()?.count())
    }

    // ========== Activity log ==========

    /// Append a log entry, assigning the next log id.
    pub fn append_log(
        &self,
        timestamp: i64,
        device_id: &str,
        action: &str,
        command_id: Option<u64>,
    ) -> Result<LogRecord> {
        let write_txn = self.db.begin_write()?;
        let record = {
            let id = Self::next_seq(&write_txn, NEXT_LOG_ID)?;
            let record = LogRecord {
                id,
                timestamp,
                device_id: device_id.to_string(),
                action: action.to_string(),
                command_id,
            };
            let mut table = write_txn.open_table(ACTIVITY_LOG_TABLE)?;
            let bytes = bincode::serialize(&record)?;
            table.insert(id, bytes.as_slice())?;
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    /// Insert a log row preserving its id. Used by replica replay.
    pub fn put_log(&self, record: &LogRecord) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ACTIVITY_LOG_TABLE)?;
            let bytes = bincode::serialize(record)?;
            table.insert(record.id, bytes.as_slice())?;
            let mut counters = write_txn.open_table(COUNTERS_TABLE)?;
            let next = counters.get(NEXT_LOG_ID)?.map(|v| v.value()).unwrap_or(1);
            if record.id >= next {
                counters.insert(NEXT_LOG_ID, record.id + 1)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Most recent log entries, newest first.
    pub fn recent_logs(&self, limit: usize) -> Result<Vec<LogRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACTIVITY_LOG_TABLE)?;
        let mut logs = Vec::new();
        for entry in table.iter()?.rev().take(limit) {
            let (_key, value) = entry?;
            logs.push(bincode::deserialize(value.value())?);
        }
        Ok(logs)
    }

    /// Log entries for one device, newest first.
    pub fn logs_for_device(&self, device_id: &str, limit: usize) -> Result<Vec<LogRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACTIVITY_LOG_TABLE)?;
        let mut logs = Vec::new();
        for entry in table.iter()?.rev() {
            let (_key, value) = entry?;
            let record: LogRecord = bincode::deserialize(value.value())?;
            if record.device_id == device_id {
                logs.push(record);
                if logs.len() >= limit {
                    break;
                }
            }
        }
        Ok(logs)
    }

    // ========== Internals ==========

    fn insert_command_row(
        write_txn: &redb::WriteTransaction,
        record: &CommandRecord,
    ) -> Result<()> {
        let mut commands = write_txn.open_table(COMMANDS_TABLE)?;
        let bytes = bincode::serialize(record)?;
        commands.insert((record.device_id.as_str(), record.id), bytes.as_slice())?;
        let mut index = write_txn.open_table(COMMAND_INDEX_TABLE)?;
        index.insert(record.id, record.device_id.as_str())?;
        Ok(())
    }

    /// Take the next value of a named counter, bumping it in place. Counters
    /// start at 1 so 0 never appears as a real id.
    fn next_seq(write_txn: &redb::WriteTransaction, name: &str) -> Result<u64> {
        let mut counters = write_txn.open_table(COUNTERS_TABLE)?;
        let value = counters.get(name)?.map(|v| v.value()).unwrap_or(1);
        counters.insert(name, value + 1)?;
        Ok(value)
    }
}
