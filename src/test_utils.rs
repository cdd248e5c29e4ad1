/*
 * Test utilities and fakes for psumon
 *
 * A scripted in-memory PMBus device and a switchable power gate, shared by the
 * unit tests of every module.
 */

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::constants::registers;
use crate::decode::encode_linear11;
use crate::hw::{BusError, BusTransport, PowerGoodGate};

/// One bus transaction as seen by the fake device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    ReadByte(u8),
    ReadWord(u8),
    WriteWord(u8, u16),
    ReadBlock(u8, usize),
}

#[derive(Default)]
struct Registers {
    bytes: HashMap<u8, u8>,
    words: HashMap<u8, u16>,
    /// Block contents as sent on the wire, count byte first
    blocks: HashMap<u8, Vec<u8>>,
    failing: HashSet<u8>,
    short_blocks: HashSet<u8>,
    log: Vec<Transaction>,
}

/// Scripted PMBus device. Every transaction is logged, failed ones included.
#[derive(Default)]
pub struct FakeBus {
    regs: Mutex<Registers>,
}

impl FakeBus {
    /// A YM-2651Y at 12 V, 33 C, fan at 40 %
    pub fn healthy() -> Self {
        let bus = Self::default();
        {
            let mut regs = bus.regs.lock();
            regs.bytes.insert(registers::CAPABILITY, 0xB0);
            regs.bytes.insert(registers::VOUT_MODE, 0x17);
            regs.bytes.insert(registers::STATUS_TEMPERATURE, 0);
            regs.bytes.insert(registers::STATUS_FANS_1_2, 0);
            regs.bytes.insert(registers::PMBUS_REVISION, 0x22);

            let words = [
                (registers::STATUS_WORD, 0),
                (registers::READ_VOUT, encode_linear11(24, -1)),
                (registers::READ_IOUT, encode_linear11(50, -2)),
                (registers::READ_POUT, encode_linear11(150, 0)),
                (registers::READ_TEMPERATURE_1, encode_linear11(33, 0)),
                (registers::READ_TEMPERATURE_2, encode_linear11(35, 0)),
                (registers::READ_TEMPERATURE_3, encode_linear11(37, 0)),
                (registers::FAN_COMMAND_1, 40),
                (registers::FAN_COMMAND_2, 0),
                (registers::READ_FAN_SPEED_1, encode_linear11(600, 3)),
                (registers::MFR_VIN_MIN, encode_linear11(90, 0)),
                (registers::MFR_VIN_MAX, encode_linear11(264, 0)),
                (registers::MFR_IIN_MAX, encode_linear11(10, 0)),
                (registers::MFR_PIN_MAX, encode_linear11(720, 0)),
                (registers::MFR_VOUT_MIN, encode_linear11(23, -1)),
                (registers::MFR_VOUT_MAX, encode_linear11(25, -1)),
                (registers::MFR_IOUT_MAX, encode_linear11(54, 0)),
                (registers::MFR_POUT_MAX, encode_linear11(650, 0)),
            ];
            regs.words.extend(words);
        }

        bus.set_string_block(registers::MFR_FAN_DIRECTION, "F2B");
        bus.set_string_block(registers::MFR_ID, "3Y POWER");
        bus.set_string_block(registers::MFR_MODEL, "YM-2651Y");
        bus.set_string_block(registers::MFR_REVISION, "A");
        bus
    }

    pub fn word(&self, command: u8) -> u16 {
        self.regs.lock().words.get(&command).copied().unwrap_or(0)
    }

    pub fn set_word(&self, command: u8, value: u16) {
        self.regs.lock().words.insert(command, value);
    }

    /// Raw block contents, count byte included
    pub fn set_block(&self, command: u8, raw: Vec<u8>) {
        self.regs.lock().blocks.insert(command, raw);
    }

    /// Length-prefixed string block
    pub fn set_string_block(&self, command: u8, text: &str) {
        let mut raw = vec![text.len() as u8];
        raw.extend_from_slice(text.as_bytes());
        self.set_block(command, raw);
    }

    /// Make every transaction on `command` fail
    pub fn fail(&self, command: u8) {
        self.regs.lock().failing.insert(command);
    }

    pub fn recover(&self, command: u8) {
        self.regs.lock().failing.remove(&command);
    }

    /// Make block reads on `command` return one byte less than asked
    pub fn truncate_blocks(&self, command: u8) {
        self.regs.lock().short_blocks.insert(command);
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.regs.lock().log.clone()
    }

    pub fn clear_transactions(&self) {
        self.regs.lock().log.clear();
    }
}

impl BusTransport for FakeBus {
    fn read_byte(&self, command: u8) -> Result<u8, BusError> {
        let mut regs = self.regs.lock();
        regs.log.push(Transaction::ReadByte(command));
        if regs.failing.contains(&command) {
            return Err(BusError::io(command, "scripted failure"));
        }
        Ok(regs.bytes.get(&command).copied().unwrap_or(0))
    }

    fn read_word(&self, command: u8) -> Result<u16, BusError> {
        let mut regs = self.regs.lock();
        regs.log.push(Transaction::ReadWord(command));
        if regs.failing.contains(&command) {
            return Err(BusError::io(command, "scripted failure"));
        }
        Ok(regs.words.get(&command).copied().unwrap_or(0))
    }

    fn write_word(&self, command: u8, value: u16) -> Result<(), BusError> {
        let mut regs = self.regs.lock();
        regs.log.push(Transaction::WriteWord(command, value));
        if regs.failing.contains(&command) {
            return Err(BusError::io(command, "scripted failure"));
        }
        regs.words.insert(command, value);
        Ok(())
    }

    fn read_block(&self, command: u8, len: usize) -> Result<Vec<u8>, BusError> {
        let mut regs = self.regs.lock();
        regs.log.push(Transaction::ReadBlock(command, len));
        if regs.failing.contains(&command) {
            return Err(BusError::io(command, "scripted failure"));
        }

        let mut raw = regs.blocks.get(&command).cloned().unwrap_or_default();
        raw.resize(len, 0);
        if regs.short_blocks.contains(&command) {
            raw.truncate(len.saturating_sub(1));
        }
        Ok(raw)
    }
}

/// Power gate whose answers can be flipped from the test
pub struct SwitchGate {
    powergood: AtomicBool,
    presence: AtomicBool,
    /// Answer "good" only for this many calls, then "not good"
    budget: Option<usize>,
    calls: AtomicUsize,
}

impl SwitchGate {
    pub fn new(powergood: bool) -> Self {
        Self {
            powergood: AtomicBool::new(powergood),
            presence: AtomicBool::new(true),
            budget: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn good_for(calls: usize) -> Self {
        Self {
            budget: Some(calls),
            ..Self::new(true)
        }
    }

    pub fn set(&self, powergood: bool) {
        self.powergood.store(powergood, Ordering::SeqCst);
    }

    pub fn set_presence(&self, presence: bool) {
        self.presence.store(presence, Ordering::SeqCst);
    }

    pub fn powergood_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PowerGoodGate for SwitchGate {
    fn get_powergood(&self) -> bool {
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.budget {
            Some(budget) if previous >= budget => false,
            _ => self.powergood.load(Ordering::SeqCst),
        }
    }

    fn get_presence(&self) -> bool {
        self.presence.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_bus_blocks_pad_and_truncate() {
        let bus = FakeBus::healthy();
        assert_eq!(bus.read_block(registers::MFR_MODEL, 1).unwrap(), vec![8]);
        assert_eq!(bus.read_block(registers::MFR_REVISION, 4).unwrap(), vec![1, b'A', 0, 0]);

        bus.truncate_blocks(registers::MFR_ID);
        assert_eq!(bus.read_block(registers::MFR_ID, 9).unwrap().len(), 8);
    }

    #[test]
    fn test_fake_bus_logs_failures() {
        let bus = FakeBus::healthy();
        bus.fail(registers::READ_VOUT);
        assert!(bus.read_word(registers::READ_VOUT).is_err());
        assert_eq!(bus.transactions(), vec![Transaction::ReadWord(registers::READ_VOUT)]);
    }

    #[test]
    fn test_switch_gate_budget() {
        let gate = SwitchGate::good_for(2);
        assert!(gate.get_powergood());
        assert!(gate.get_powergood());
        assert!(!gate.get_powergood());
        assert_eq!(gate.powergood_calls(), 3);
    }
}
