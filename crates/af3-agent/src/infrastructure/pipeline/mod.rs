pub mod alphafold;

pub use alphafold::AlphaFold3Pipeline;
