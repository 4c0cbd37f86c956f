//! Domain model, check splitter, and bin packer family for the rimm
//! scheduler simulator (spec components A-D).

pub mod error;
pub mod model;
pub mod packer;
pub mod splitter;
pub mod state;

pub use error::CoreError;
pub use model::{Bin, BinId, Check, CheckGroup, CheckId, Task, TaskId};
pub use packer::{make_packer, Packer, PACKER_NAMES};
pub use splitter::{make_splitter, Splitter, SPLITTER_NAMES};
pub use state::{RanTaskPolicy, SchedulerState, VarValue, Vars};
