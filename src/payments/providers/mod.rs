pub mod wompi;
