use std::fmt;

// The two stages a build walks through; there is no way back to the first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildStage {
    AttemptNativeBuild,
    SynthesizePlaceholder,
}

impl BuildStage {
    pub fn label(self) -> &'static str {
        match self {
            BuildStage::AttemptNativeBuild => "attempt-native-build",
            BuildStage::SynthesizePlaceholder => "synthesize-placeholder",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
