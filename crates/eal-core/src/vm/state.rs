//! Per-request machine state: registers, memory and the function table

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::bytecode::Instruction;

/// Named integer registers. Unset registers read as 0.
#[derive(Debug, Clone, Default)]
pub struct Registers {
    values: HashMap<String, i64>,
}

impl Registers {
    pub fn get(&self, name: &str) -> i64 {
        self.values.get(name).copied().unwrap_or(0)
    }

    pub fn set(&mut self, name: &str, value: i64) {
        match self.values.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.values.insert(name.to_string(), value);
            }
        }
    }

    /// True once the register has been written
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Written registers sorted by name
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect()
    }
}

/// Address of a cell inside a container
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    /// `name[index]`
    Index(i64),

    /// `name{key}`
    Key(String),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Index(index) => write!(f, "[{index}]"),
            Slot::Key(key) => write!(f, "{{{key}}}"),
        }
    }
}

/// Two-level cell storage: container name, then slot. Unset cells read as 0.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    containers: HashMap<String, HashMap<Slot, i64>>,
}

impl Memory {
    pub fn get(&self, container: &str, slot: &Slot) -> i64 {
        self.containers
            .get(container)
            .and_then(|cells| cells.get(slot))
            .copied()
            .unwrap_or(0)
    }

    pub fn set(&mut self, container: &str, slot: Slot, value: i64) {
        self.containers
            .entry(container.to_string())
            .or_default()
            .insert(slot, value);
    }

    /// Number of containers with at least one written cell
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Written cells, sorted by container then slot
    pub fn snapshot(&self) -> Vec<MemoryCell> {
        let mut cells: Vec<MemoryCell> = self
            .containers
            .iter()
            .flat_map(|(container, slots)| {
                slots.iter().map(move |(slot, value)| MemoryCell {
                    container: container.clone(),
                    slot: slot.clone(),
                    value: *value,
                })
            })
            .collect();
        cells.sort_by(|a, b| (&a.container, &a.slot).cmp(&(&b.container, &b.slot)));
        cells
    }
}

/// One written memory cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryCell {
    pub container: String,
    #[serde(serialize_with = "serialize_slot")]
    pub slot: Slot,
    pub value: i64,
}

fn serialize_slot<S: serde::Serializer>(slot: &Slot, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(slot)
}

impl fmt::Display for MemoryCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} = {}", self.container, self.slot, self.value)
    }
}

/// Function bodies by name
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    bodies: HashMap<String, Rc<[Instruction]>>,
}

impl FunctionTable {
    /// Store a body; returns true when an existing definition was replaced
    pub fn define(&mut self, name: impl Into<String>, body: Vec<Instruction>) -> bool {
        self.bodies.insert(name.into(), Rc::from(body)).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&[Instruction]> {
        self.bodies.get(name).map(|body| &**body)
    }

    /// A shared handle to a body, for executing it while the table may change
    pub fn body(&self, name: &str) -> Option<Rc<[Instruction]>> {
        self.bodies.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bodies.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_default_to_zero() {
        let mut regs = Registers::default();
        assert_eq!(regs.get("r1"), 0);
        assert!(!regs.contains("r1"));
        regs.set("r1", 4);
        regs.set("r1", 5);
        assert_eq!(regs.get("r1"), 5);
        assert_eq!(regs.len(), 1);
    }

    #[test]
    fn register_snapshot_is_sorted() {
        let mut regs = Registers::default();
        regs.set("ebx", 2);
        regs.set("eax", 1);
        let names: Vec<String> = regs.snapshot().into_keys().collect();
        assert_eq!(names, vec!["eax", "ebx"]);
    }

    #[test]
    fn memory_cells_default_to_zero() {
        let mut mem = Memory::default();
        mem.set("arr", Slot::Index(0), 7);
        mem.set("env", Slot::Key("home".to_string()), 1);
        assert_eq!(mem.get("arr", &Slot::Index(0)), 7);
        assert_eq!(mem.get("arr", &Slot::Index(1)), 0);
        assert_eq!(mem.get("nope", &Slot::Index(0)), 0);
        assert_eq!(mem.len(), 2);
    }

    #[test]
    fn memory_snapshot_formats_cells() {
        let mut mem = Memory::default();
        mem.set("env", Slot::Key("home".to_string()), 1);
        mem.set("arr", Slot::Index(2), 9);
        mem.set("arr", Slot::Index(-1), 3);
        let rendered: Vec<String> = mem.snapshot().iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["arr[-1] = 3", "arr[2] = 9", "env{home} = 1"]);
    }

    #[test]
    fn function_table_redefinition() {
        let mut table = FunctionTable::default();
        assert!(!table.define("f", Vec::new()));
        assert!(table.define("f", Vec::new()));
        assert!(table.contains("f"));
        let first = table.body("f").unwrap();
        assert!(Rc::ptr_eq(&first, &table.body("f").unwrap()));
        assert!(table.get("g").is_none());
    }
}
