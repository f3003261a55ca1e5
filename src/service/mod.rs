//! CrudService: generic CRUD using the safe SQL builder, plus body schemas.

mod crud;
mod validation;
pub use crud::{create_handler, delete_handler, list_handler, update_handler, CrudService, ListPage};
pub use validation::Schema;
