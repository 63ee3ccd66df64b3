//! The load/save contract every chunk implements.

use std::any::Any;

use crate::error::Result;
use crate::loader::ResFileLoader;
use crate::saver::ResFileSaver;

/// A chunk of the object graph that can read and write itself.
///
/// `load` starts at the chunk's first byte and must consume exactly the bytes
/// `save` writes. Children are never written inline: `save` reserves them
/// through the saver, which places them later and backpatches the offsets.
pub trait ResData: Any {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self>
    where
        Self: Sized;

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()>;
}
