// Copyright 2024 The embedding-parity Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::ParityError;

/// # Utility to deserialize JSON config files
pub trait Config
where
    for<'de> Self: Deserialize<'de>,
{
    /// Loads a `Config` object from a JSON file.
    ///
    /// # Arguments
    ///
    /// * `path` - `Path` to the configuration JSON file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use embedding_parity::parity::ParityConfig;
    /// use embedding_parity::Config;
    /// use std::path::Path;
    ///
    /// # fn main() -> Result<(), embedding_parity::ParityError> {
    /// let config = ParityConfig::from_file(Path::new("path/to/parity.json"))?;
    /// # Ok(())
    /// # }
    /// ```
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ParityError> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|error| {
            ParityError::IOError(format!(
                "could not open configuration file {}: {error}",
                path.display()
            ))
        })?;
        let br = BufReader::new(f);
        let config: Self = serde_json::from_reader(br)?;
        Ok(config)
    }
}
