use serde::Serialize;

/// Tick categories, POSIX style. The ordinal order is a contract: every tick
/// row is indexed positionally by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TickType {
    User,
    System,
    Irq,
    SoftIrq,
    Idle,
}

impl TickType {
    pub const COUNT: usize = 5;

    pub const ALL: [TickType; TickType::COUNT] = [
        TickType::User,
        TickType::System,
        TickType::Irq,
        TickType::SoftIrq,
        TickType::Idle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            TickType::User => "user",
            TickType::System => "system",
            TickType::Irq => "irq",
            TickType::SoftIrq => "softirq",
            TickType::Idle => "idle",
        }
    }
}

/// Cumulative ticks for one core, ordered by `TickType`.
pub type TickRow = [u64; TickType::COUNT];

/// 100ns counter units per 100µs tick.
const UNITS_PER_TICK: u64 = 10_000;

/// Convert per-category 100ns counter values into one tick row.
///
/// The platform counts interrupt and DPC time inside privileged time, so both
/// are subtracted from `system` first; categories are sampled at slightly
/// different instants, so the subtraction may underflow and is clamped rather
/// than treated as fatal.
pub(crate) fn normalize(user: u64, system: u64, irq: u64, softirq: u64, idle: u64) -> TickRow {
    let system = match system.checked_sub(irq + softirq) {
        Some(system) => system,
        None => {
            log::warn!(
                "Privileged time {} behind interrupt time {}+{}, clamping",
                system,
                irq,
                softirq
            );
            0
        }
    };

    [
        user / UNITS_PER_TICK,
        system / UNITS_PER_TICK,
        irq / UNITS_PER_TICK,
        softirq / UNITS_PER_TICK,
        idle / UNITS_PER_TICK,
    ]
}
