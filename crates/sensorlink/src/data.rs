// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! The opaque sensor-measurement payload boundary.

/// A serializable sensor-measurement artifact.
///
/// The crate never looks inside a payload. It decodes one at two boundaries
/// (history responses, push notifications) and encodes one at one boundary
/// (server-side command results); the byte layout is the implementer's
/// contract.
pub trait Payload: Sized + Send + 'static {
    /// Decodes a payload from its wire bytes.
    ///
    /// # Errors
    ///
    /// Returns an error when the bytes do not form a valid payload.
    fn from_wire(bytes: &[u8]) -> anyhow::Result<Self>;

    /// Encodes the payload into its wire bytes.
    fn to_wire(&self) -> Vec<u8>;
}
