pub mod detector;
pub mod zones;
