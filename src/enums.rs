// String-backed enums shared by devices, profiles and sensors
// The string forms are what clients send and what the stores persist.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            #[default]
            Unknown,
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $name::Unknown => "unknown",
                    $($name::$variant => $text),+
                }
            }

            /// Unrecognised strings map to `Unknown`
            pub fn from_str_lossy(s: &str) -> Self {
                match s {
                    $($text => $name::$variant,)+
                    _ => $name::Unknown,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Ok($name::from_str_lossy(&s))
            }
        }
    };
}

string_enum!(DeviceKind {
    Camera => "camera",
    Display => "display",
    Printer => "printer",
    Scanner => "scanner",
    Webcam => "webcam",
});

string_enum!(ProfileKind {
    Abstract => "abstract",
    ColorspaceConversion => "colorspace-conversion",
    Devicelink => "devicelink",
    DisplayDevice => "display-device",
    InputDevice => "input-device",
    NamedColor => "named-color",
    OutputDevice => "output-device",
});

string_enum!(Colorspace {
    Cmy => "cmy",
    Cmyk => "cmyk",
    Gray => "gray",
    Hsv => "hsv",
    Lab => "lab",
    Luv => "luv",
    Rgb => "rgb",
    Xyz => "xyz",
    Ycbcr => "ycbcr",
    Yxy => "yxy",
});

string_enum!(
    /// Hard associations are explicit user choices; soft ones are inferred
    DeviceRelation {
        Hard => "hard",
        Soft => "soft",
    }
);

string_enum!(DeviceMode {
    Physical => "physical",
    Virtual => "virtual",
});

string_enum!(
    /// Lifetime of a device or profile: temp dies with its creator, disk survives restarts
    ObjectScope {
        Disk => "disk",
        Normal => "normal",
        Temp => "temp",
    }
);

string_enum!(SensorKind {
    Colorhug => "colorhug",
    Colorhug2 => "colorhug2",
    ColorhugPlus => "colorhug-plus",
    ColorimtreHcfr => "colorimtre-hcfr",
    ColorMunkiPhoto => "color-munki-photo",
    ColorMunkiSmile => "color-munki-smile",
    Dtp20 => "dtp20",
    Dtp22 => "dtp22",
    Dtp41 => "dtp41",
    Dtp51 => "dtp51",
    Dtp92 => "dtp92",
    Dtp94 => "dtp94",
    Dummy => "dummy",
    Huey => "huey",
    I1Display1 => "i1-display1",
    I1Display2 => "i1-display2",
    I1Display3 => "i1-display3",
    I1Monitor => "i1-monitor",
    I1Pro => "i1-pro",
    SpectroScan => "spectro-scan",
    Spyder2 => "spyder2",
    Spyder3 => "spyder3",
    Spyder4 => "spyder4",
    Spyder5 => "spyder5",
    Spyder => "spyder",
    Spark => "spark",
});

string_enum!(SensorState {
    Busy => "busy",
    Idle => "idle",
    Measuring => "measuring",
    Starting => "starting",
});

string_enum!(SensorCap {
    Ambient => "ambient",
    Calibration => "calibration",
    Crt => "crt",
    LcdCcfl => "lcd-ccfl",
    Lcd => "lcd",
    LcdRgbLed => "lcd-rgb-led",
    LcdWhiteLed => "lcd-white-led",
    Led => "led",
    Plasma => "plasma",
    Printer => "printer",
    Projector => "projector",
    Spot => "spot",
    WideGamutLcdCcfl => "wide-gamut-lcd-ccfl",
    WideGamutLcdRgbLed => "wide-gamut-lcd-rgb-led",
    Spectral => "spectral",
    CalibrationDark => "calibration-dark",
    CalibrationIrradiance => "calibration-irradiance",
});

string_enum!(StandardSpace {
    AdobeRgb => "adobe-rgb",
    ProphotoRgb => "prophoto-rgb",
    Srgb => "srgb",
});

string_enum!(RenderingIntent {
    AbsoluteColorimetric => "absolute-colorimetric",
    Perceptual => "perceptual",
    RelativeColorimetric => "relative-colorimetric",
    Saturation => "saturation",
});

string_enum!(ProfileWarning {
    CopyrightMissing => "copyright-missing",
    DescriptionMissing => "description-missing",
    GrayAxisInvalid => "gray-axis-invalid",
    GrayAxisNonMonotonic => "gray-axis-non-monotonic",
    None => "none",
    PrimariesInvalid => "primaries-invalid",
    PrimariesNonAdditive => "primaries-non-additive",
    PrimariesUnlikely => "primaries-unlikely",
    ScumDot => "scum-dot",
    VcgtNonMonotonic => "vcgt-non-monotonic",
    WhitepointInvalid => "whitepoint-invalid",
    WhitepointUnlikely => "whitepoint-unlikely",
});
