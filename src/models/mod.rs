mod token;

pub use token::{JwtRefreshToken, TokenRecord};
