pub mod send_controller;

pub use send_controller::{
    Collaborators, DeltaSink, IMAGE_GENERATION_FAILURE_REPLY, SendController, SendOutcome,
};
