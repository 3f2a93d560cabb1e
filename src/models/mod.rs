pub mod doctor;
pub mod enums;
pub mod hospital;
pub mod procedure;
pub mod profile;
pub mod user;

pub use doctor::*;
pub use enums::*;
pub use hospital::*;
pub use procedure::*;
pub use profile::*;
pub use user::*;
