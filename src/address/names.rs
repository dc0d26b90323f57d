// Tue Oct 20 2026 - Alex

/// Handle-indexed string table. Handle 0 always maps to the empty name, and
/// released handles are reused.
#[derive(Debug, Clone)]
pub struct NameTable {
    strings: Vec<String>,
    free: Vec<u32>,
}

impl Default for NameTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NameTable {
    pub const EMPTY: u32 = 0;

    pub fn new() -> Self {
        Self {
            strings: vec![String::new()],
            free: Vec::new(),
        }
    }

    pub fn add(&mut self, name: &str) -> u32 {
        match self.free.pop() {
            Some(handle) => {
                self.strings[handle as usize] = name.to_string();
                handle
            }
            None => {
                self.strings.push(name.to_string());
                (self.strings.len() - 1) as u32
            }
        }
    }

    pub fn get(&self, handle: u32) -> &str {
        self.strings.get(handle as usize).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, handle: u32, name: &str) {
        if handle != Self::EMPTY {
            if let Some(slot) = self.strings.get_mut(handle as usize) {
                *slot = name.to_string();
            }
        }
    }

    pub fn remove(&mut self, handle: u32) {
        if handle == Self::EMPTY || handle as usize >= self.strings.len() {
            return;
        }
        self.strings[handle as usize].clear();
        self.free.push(handle);
    }

    /// Number of live names.
    pub fn len(&self) -> usize {
        self.strings.len() - 1 - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
