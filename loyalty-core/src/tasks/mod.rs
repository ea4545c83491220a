pub mod expiry_sweep;
