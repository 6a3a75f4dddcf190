pub mod vector_store_client;

pub use vector_store_client::{UnavailableVectorStore, VectorStoreClient};
