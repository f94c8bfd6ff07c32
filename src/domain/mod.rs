pub mod entities;
pub mod reconcile;
pub mod value_objects;
