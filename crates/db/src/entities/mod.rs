//! `SeaORM` entity definitions.

#![allow(missing_docs)]

pub mod migrations;
