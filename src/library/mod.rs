pub mod block_queue;
pub mod pipe;

pub use block_queue::BlockQueue;
pub use pipe::PipeStream;


#[cfg(test)]
mod pipe_test;
