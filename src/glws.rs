//! The windowing system interface.
//!
//! Replay doesn't create windows or GLX contexts itself; it asks an
//! implementation of `Windowing` to. This module defines that trait, along
//! with the `Visual` and `Profile` values that describe what to create.

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

/// A windowing system that can create surfaces and contexts, and bind them.
///
/// The surface and context types are owned values: whoever holds one is
/// responsible for it, and dropping it releases the native object.
pub trait Windowing {
    type Surface;
    type Context;

    /// Create a surface (a window, or an off-screen drawable) for `visual`.
    fn create_surface(&mut self, visual: &Visual) -> Result<Self::Surface, WindowingError>;

    /// Create a context for `visual` and `profile`, sharing objects with
    /// `share` if it is given.
    fn create_context(
        &mut self,
        visual: &Visual,
        share: Option<&Self::Context>,
        profile: Profile,
    ) -> Result<Self::Context, WindowingError>;

    /// Make `context` current on `surface`. Either may be `None`, to unbind.
    /// Return true on success.
    fn make_current(
        &mut self,
        surface: Option<&Self::Surface>,
        context: Option<&Self::Context>,
    ) -> bool;

    /// Swap `surface`'s front and back buffers.
    fn swap_buffers(&mut self, surface: &Self::Surface);
}

/// A failure reported by the windowing system.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct WindowingError(pub String);

/// The pixel format and size that replay surfaces are created with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visual {
    pub double_buffered: bool,
    pub samples: u32,
    pub width: u32,
    pub height: u32,
}

/// Which flavor of OpenGL a context provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    Gl,
    Es,
}

/// An OpenGL API, version, and profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub api: Api,
    pub major: u8,
    pub minor: u8,
    pub core: bool,
}

impl Profile {
    /// A desktop GL compatibility profile, version 1.0: "whatever the driver
    /// gives us by default".
    pub const COMPAT: Profile = Profile {
        api: Api::Gl,
        major: 1,
        minor: 0,
        core: false,
    };

    /// Determine a context's profile from a `glXCreateContextAttribsARB`
    /// attribute list, falling back to `default` for anything it doesn't say.
    ///
    /// `attribs` holds key/value pairs, terminated by a zero key or by the end
    /// of the slice.
    pub fn from_attrib_list(attribs: &[i32], default: Profile) -> Profile {
        let mut profile = default;
        let mut version_given = false;
        let mut profile_mask = None;

        for pair in attribs.chunks(2) {
            let (key, value) = match *pair {
                [0, ..] => break,
                [key, value] => (key, value),
                // An odd trailing key with no value.
                _ => break,
            };
            match key {
                GLX_CONTEXT_MAJOR_VERSION_ARB => {
                    profile.major = match u8::try_from(value) {
                        Ok(n) => n,
                        // No such version; the list is garbage.
                        Err(_) => return default,
                    };
                    version_given = true;
                }
                GLX_CONTEXT_MINOR_VERSION_ARB => {
                    profile.minor = match u8::try_from(value) {
                        Ok(n) => n,
                        // No such version; the list is garbage.
                        Err(_) => return default,
                    };
                    version_given = true;
                }
                GLX_CONTEXT_PROFILE_MASK_ARB => profile_mask = Some(value),
                _ => (),
            }
        }

        if version_given && profile_mask.is_none() {
            // The ARB default is the core profile, but it's only a
            // distinction from 3.2 on.
            profile_mask = Some(GLX_CONTEXT_CORE_PROFILE_BIT_ARB);
        }

        match profile_mask {
            Some(mask) if mask & GLX_CONTEXT_ES2_PROFILE_BIT_EXT != 0 => {
                profile.api = Api::Es;
                profile.core = false;
            }
            Some(mask) if mask & GLX_CONTEXT_CORE_PROFILE_BIT_ARB != 0 => {
                profile.api = Api::Gl;
                profile.core = (profile.major, profile.minor) >= (3, 2);
            }
            Some(_) => {
                profile.api = Api::Gl;
                profile.core = false;
            }
            None => (),
        }

        profile
    }
}

impl Default for Profile {
    fn default() -> Profile {
        Profile::COMPAT
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self.api {
            Api::Es => write!(fmt, "es{}.{}", self.major, self.minor),
            Api::Gl if *self == Profile::COMPAT => fmt.write_str("compat"),
            Api::Gl => {
                write!(fmt, "{}.{}", self.major, self.minor)?;
                if self.core {
                    fmt.write_str("core")?;
                }
                Ok(())
            }
        }
    }
}

/// Parse `compat`, `3.2`, `3.2core`, or `es2.0`.
impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Profile, String> {
        if s == "compat" {
            return Ok(Profile::COMPAT);
        }

        let bad = || format!("unrecognized context profile: {:?}", s);
        let (api, rest) = match s.strip_prefix("es") {
            Some(rest) => (Api::Es, rest),
            None => (Api::Gl, s),
        };
        let (version, core) = match rest.strip_suffix("core") {
            Some(version) if api == Api::Gl => (version, true),
            Some(_) => return Err(bad()),
            None => (rest, false),
        };
        let mut parts = version.splitn(2, '.');
        let major = parts.next().and_then(|n| n.parse().ok()).ok_or_else(bad)?;
        let minor = match parts.next() {
            Some(n) => n.parse().map_err(|_| bad())?,
            None => 0,
        };
        if core && (major, minor) < (3, 2) {
            return Err(format!("there is no core profile before 3.2: {:?}", s));
        }

        Ok(Profile {
            api,
            major,
            minor,
            core,
        })
    }
}

pub const GLX_CONTEXT_MAJOR_VERSION_ARB: i32 = 0x2091;
pub const GLX_CONTEXT_MINOR_VERSION_ARB: i32 = 0x2092;
pub const GLX_CONTEXT_FLAGS_ARB: i32 = 0x2094;
pub const GLX_CONTEXT_PROFILE_MASK_ARB: i32 = 0x9126;
pub const GLX_CONTEXT_CORE_PROFILE_BIT_ARB: i32 = 0x1;
pub const GLX_CONTEXT_COMPATIBILITY_PROFILE_BIT_ARB: i32 = 0x2;
pub const GLX_CONTEXT_ES2_PROFILE_BIT_EXT: i32 = 0x4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_profiles() {
        assert_eq!("compat".parse::<Profile>(), Ok(Profile::COMPAT));
        assert_eq!(
            "3.2core".parse::<Profile>(),
            Ok(Profile { api: Api::Gl, major: 3, minor: 2, core: true })
        );
        assert_eq!(
            "es2.0".parse::<Profile>(),
            Ok(Profile { api: Api::Es, major: 2, minor: 0, core: false })
        );
        assert_eq!(
            "4".parse::<Profile>(),
            Ok(Profile { api: Api::Gl, major: 4, minor: 0, core: false })
        );
        assert!("3.1core".parse::<Profile>().is_err());
        assert!("es3.0core".parse::<Profile>().is_err());
        assert!("banana".parse::<Profile>().is_err());

        for text in &["compat", "3.3core", "2.1", "es3.1"] {
            let profile: Profile = text.parse().unwrap();
            assert_eq!(profile.to_string(), *text);
        }
    }

    #[test]
    fn attrib_lists() {
        let default = Profile::COMPAT;
        assert_eq!(Profile::from_attrib_list(&[], default), default);
        assert_eq!(Profile::from_attrib_list(&[0], default), default);

        let core = Profile::from_attrib_list(
            &[GLX_CONTEXT_MAJOR_VERSION_ARB, 3, GLX_CONTEXT_MINOR_VERSION_ARB, 3, 0],
            default,
        );
        assert_eq!(core, Profile { api: Api::Gl, major: 3, minor: 3, core: true });

        let compat = Profile::from_attrib_list(
            &[
                GLX_CONTEXT_MAJOR_VERSION_ARB, 3,
                GLX_CONTEXT_MINOR_VERSION_ARB, 3,
                GLX_CONTEXT_PROFILE_MASK_ARB, GLX_CONTEXT_COMPATIBILITY_PROFILE_BIT_ARB,
                0,
            ],
            default,
        );
        assert_eq!(compat, Profile { api: Api::Gl, major: 3, minor: 3, core: false });

        let es = Profile::from_attrib_list(
            &[
                GLX_CONTEXT_PROFILE_MASK_ARB, GLX_CONTEXT_ES2_PROFILE_BIT_EXT,
                GLX_CONTEXT_MAJOR_VERSION_ARB, 2,
                0,
            ],
            default,
        );
        assert_eq!(es, Profile { api: Api::Es, major: 2, minor: 0, core: false });

        // Flags don't affect the profile, and anything after the terminator
        // is ignored.
        let flagged = Profile::from_attrib_list(
            &[GLX_CONTEXT_FLAGS_ARB, 1, 0, GLX_CONTEXT_MAJOR_VERSION_ARB, 4],
            default,
        );
        assert_eq!(flagged, default);

        // Versions that don't fit in a byte select the default outright.
        let es = Profile { api: Api::Es, major: 2, minor: 0, core: false };
        for attribs in &[
            [GLX_CONTEXT_MAJOR_VERSION_ARB, 0x103, 0],
            [GLX_CONTEXT_MAJOR_VERSION_ARB, -1, 0],
            [GLX_CONTEXT_MINOR_VERSION_ARB, 256, 0],
        ] {
            assert_eq!(Profile::from_attrib_list(attribs, default), default);
            assert_eq!(Profile::from_attrib_list(attribs, es), es);
        }
    }
}
