/// Command for the open-drain style VSS line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputLevel {
    /// Line released (transistor off). The idle state.
    #[default]
    Released,
    /// Line pulled low (transistor on).
    Sunk,
}

impl OutputLevel {
    pub fn toggled(self) -> Self {
        match self {
            Self::Released => Self::Sunk,
            Self::Sunk => Self::Released,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Released => 0.0,
            Self::Sunk => 1.0,
        }
    }
}

pub trait PulseOutput: Send {
    fn set_level(&mut self, level: OutputLevel);

    /// Writes that failed since the output was opened.
    fn write_failures(&self) -> u64 {
        0
    }

    /// False while the most recent write failed.
    fn is_healthy(&self) -> bool {
        true
    }
}
