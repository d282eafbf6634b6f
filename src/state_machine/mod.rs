// Order lifecycle state machine
//
// The legal transition graph lives on `OrderStatus`; `OrderTransition` is the
// validated record of one move and is what persistence and notifications see.

pub mod errors;
pub mod states;
pub mod transitions;

pub use errors::{StateMachineError, StateMachineResult};
pub use states::OrderStatus;
pub use transitions::OrderTransition;
