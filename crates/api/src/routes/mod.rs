pub mod books;
pub mod carts;
pub mod system;
