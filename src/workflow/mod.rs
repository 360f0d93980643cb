pub mod flows;
pub mod partition;
pub mod pool;
pub mod processors;
pub mod scanner;
