mod dynamic;
mod header;
mod notes;
mod symbols;
mod tables;
mod versions;
#[cfg(feature = "visit")]
mod visit;
