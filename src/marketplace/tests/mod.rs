mod common;

mod verification;
