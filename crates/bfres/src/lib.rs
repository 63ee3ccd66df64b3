//! Reader and writer for BFRES model containers.
//!
//! A [`ResFile`] owns the whole object graph: models with their skeletons,
//! vertex buffers, shapes and materials, skeletal animations, and embedded
//! external files. Chunks referenced from several places are shared through
//! `Rc` and written once.
//!
//! ```no_run
//! use bfres::ResFile;
//!
//! let file = ResFile::from_path("model.bfres")?;
//! for (name, model) in &file.models {
//!     println!("{name}: {} shapes", model.shapes.len());
//! }
//! file.save_to_path("copy.bfres")?;
//! # Ok::<(), bfres::Error>(())
//! ```

pub mod anim;
mod arrays;
pub mod dump;
mod external;
pub mod model;
mod res_file;
mod user_data;

#[cfg(test)]
mod res_file_tests;
#[cfg(test)]
mod test_utils;

pub use bfres_core::{
    ByteOrder, Error, LoadOptions, ResData, ResDict, ResFileLoader, ResFileSaver, Result,
    Revision, SaveOptions, StringEncoding, Version,
};
pub use external::ExternalFile;
pub use res_file::{FILE_SIGNATURE, ResFile};
pub use user_data::{UserData, UserDataValue};
