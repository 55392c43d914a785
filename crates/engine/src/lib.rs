pub mod column;
pub mod intake;
pub mod matrix;
pub mod module;
pub mod narration;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod schemas;
pub mod search;
pub mod selection;
pub mod store;
