//! Result table: one optional display string per field.
//!
//! Fields are a compile-time enumeration grouped by [`Category`]. A value
//! that is `None` has simply not been determined yet. Values are never
//! cleared, only overwritten.

use serde::Serialize;

use crate::types::Category;

macro_rules! fields {
    ($( $variant:ident => $category:ident, $label:literal; )+) => {
        /// Every display field, in tab order
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum Field {
            $( $variant, )+
        }

        impl Field {
            pub const ALL: &'static [Field] = &[ $( Field::$variant, )+ ];
            pub const COUNT: usize = Field::ALL.len();

            pub fn category(&self) -> Category {
                match self {
                    $( Field::$variant => Category::$category, )+
                }
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $( Field::$variant => $label, )+
                }
            }
        }
    };
}

fields! {
    Vendor        => Cpu, "Vendor";
    Codename      => Cpu, "Code Name";
    Package       => Cpu, "Package";
    Technology    => Cpu, "Technology";
    Voltage       => Cpu, "Voltage";
    Specification => Cpu, "Specification";
    Family        => Cpu, "Family";
    ExtFamily     => Cpu, "Ext. Family";
    Model         => Cpu, "Model";
    ExtModel      => Cpu, "Ext. Model";
    Temperature   => Cpu, "Temp.";
    Stepping      => Cpu, "Stepping";
    Instructions  => Cpu, "Instructions";
    CoreSpeed     => Cpu, "Core Speed";
    Multiplier    => Cpu, "Multiplier";
    BusSpeed      => Cpu, "Bus Speed";
    Usage         => Cpu, "Usage";
    Level1D       => Cpu, "L1 Data";
    Level1I       => Cpu, "L1 Inst.";
    Level2        => Cpu, "Level 2";
    Level3        => Cpu, "Level 3";
    Sockets       => Cpu, "Socket(s)";
    Cores         => Cpu, "Core(s)";
    Threads       => Cpu, "Thread(s)";

    L1Size        => Caches, "L1 Size";
    L1Descriptor  => Caches, "L1 Descriptor";
    L1Speed       => Caches, "L1 Speed";
    L2Size        => Caches, "L2 Size";
    L2Descriptor  => Caches, "L2 Descriptor";
    L2Speed       => Caches, "L2 Speed";
    L3Size        => Caches, "L3 Size";
    L3Descriptor  => Caches, "L3 Descriptor";
    L3Speed       => Caches, "L3 Speed";

    Manufacturer  => Motherboard, "Manufacturer";
    BoardModel    => Motherboard, "Model";
    Revision      => Motherboard, "Revision";
    BiosBrand     => Motherboard, "BIOS Brand";
    BiosVersion   => Motherboard, "BIOS Version";
    BiosDate      => Motherboard, "BIOS Date";
    ChipVendor    => Motherboard, "Chipset Vendor";
    ChipModel     => Motherboard, "Chipset Model";

    Bank0         => Memory, "Bank 0";
    Bank1         => Memory, "Bank 1";
    Bank2         => Memory, "Bank 2";
    Bank3         => Memory, "Bank 3";
    Bank4         => Memory, "Bank 4";
    Bank5         => Memory, "Bank 5";
    Bank6         => Memory, "Bank 6";
    Bank7         => Memory, "Bank 7";

    Kernel        => System, "Kernel";
    Distribution  => System, "Distribution";
    Hostname      => System, "Hostname";
    Uptime        => System, "Uptime";
    Compiler      => System, "Compiler";
    MemUsed       => System, "Used";
    MemBuffers    => System, "Buffers";
    MemCached     => System, "Cached";
    MemFree       => System, "Free";
    Swap          => System, "Swap";

    Gpu1Vendor      => Graphics, "GPU 1 Vendor";
    Gpu1Model       => Graphics, "GPU 1 Model";
    Gpu1Temperature => Graphics, "GPU 1 Temp.";
    Gpu2Vendor      => Graphics, "GPU 2 Vendor";
    Gpu2Model       => Graphics, "GPU 2 Model";
    Gpu2Temperature => Graphics, "GPU 2 Temp.";
    Gpu3Vendor      => Graphics, "GPU 3 Vendor";
    Gpu3Model       => Graphics, "GPU 3 Model";
    Gpu3Temperature => Graphics, "GPU 3 Temp.";
    Gpu4Vendor      => Graphics, "GPU 4 Vendor";
    Gpu4Model       => Graphics, "GPU 4 Model";
    Gpu4Temperature => Graphics, "GPU 4 Temp.";

    PrimeSlowScore => Bench, "Prime Slow Score";
    PrimeSlowRun   => Bench, "Prime Slow Run";
    PrimeFastScore => Bench, "Prime Fast Score";
    PrimeFastRun   => Bench, "Prime Fast Run";
    ParamDuration  => Bench, "Duration";
    ParamThreads   => Bench, "Threads";
}

impl Field {
    /// Memory bank fields, indexed by DIMM slot
    pub const BANKS: [Field; 8] = [
        Field::Bank0,
        Field::Bank1,
        Field::Bank2,
        Field::Bank3,
        Field::Bank4,
        Field::Bank5,
        Field::Bank6,
        Field::Bank7,
    ];

    /// (vendor, model, temperature) per graphics card slot
    pub const GPUS: [[Field; 3]; 4] = [
        [Field::Gpu1Vendor, Field::Gpu1Model, Field::Gpu1Temperature],
        [Field::Gpu2Vendor, Field::Gpu2Model, Field::Gpu2Temperature],
        [Field::Gpu3Vendor, Field::Gpu3Model, Field::Gpu3Temperature],
        [Field::Gpu4Vendor, Field::Gpu4Model, Field::Gpu4Temperature],
    ];

    /// (size, descriptor, speed) per cache level
    pub const CACHES: [[Field; 3]; 3] = [
        [Field::L1Size, Field::L1Descriptor, Field::L1Speed],
        [Field::L2Size, Field::L2Descriptor, Field::L2Speed],
        [Field::L3Size, Field::L3Descriptor, Field::L3Speed],
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn in_category(category: Category) -> impl Iterator<Item = Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(move |f| f.category() == category)
    }
}

/// The shared table every probe writes into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    values: Vec<Option<String>>,
    /// When set, writes outside this category are rejected
    scope: Option<Category>,
}

impl Default for LabelTable {
    fn default() -> Self {
        Self {
            values: vec![None; Field::COUNT],
            scope: None,
        }
    }
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values[field.index()].as_deref()
    }

    pub fn is_set(&self, field: Field) -> bool {
        self.values[field.index()].is_some()
    }

    /// Store a value. Returns false if the write fell outside the active scope.
    pub fn set(&mut self, field: Field, value: impl Into<String>) -> bool {
        if let Some(scope) = self.scope {
            if field.category() != scope {
                tracing::warn!(
                    field = field.label(),
                    category = %field.category(),
                    scope = %scope,
                    "Dropped write outside refresh scope"
                );
                return false;
            }
        }
        self.values[field.index()] = Some(value.into());
        true
    }

    /// Set only when the value is non-empty after trimming
    pub fn set_trimmed(&mut self, field: Field, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        self.set(field, value)
    }

    /// Restrict writes to one category (partial passes)
    pub fn restrict_to(&mut self, category: Category) {
        self.scope = Some(category);
    }

    pub fn clear_scope(&mut self) {
        self.scope = None;
    }

    /// Fields of one category with their current values
    pub fn category(&self, category: Category) -> Vec<(Field, Option<&str>)> {
        Field::in_category(category)
            .map(|f| (f, self.get(f)))
            .collect()
    }

    /// Values of one category, for before/after comparisons
    pub fn snapshot(&self, category: Category) -> Vec<Option<String>> {
        Field::in_category(category)
            .map(|f| self.values[f.index()].clone())
            .collect()
    }

    pub fn count_set(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}
