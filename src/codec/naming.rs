//! File naming for geometry images and their decoded meshes.

use std::path::{Path, PathBuf};

/// File name token marking a position geometry image.
pub const POSITION_TOKEN: &str = "flatGI";

/// File name token marking a normal geometry image.
pub const NORMAL_TOKEN: &str = "nflatGI";

/// Suffix of flat (parameterized) meshes.
pub const FLAT_MESH_SUFFIX: &str = "_arcSMI";

/// Paths of the position image and, optionally, the paired normal image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryImagePaths {
    /// The position image.
    pub position: PathBuf,
    /// The normal image, if one belongs to the pair.
    pub normal: Option<PathBuf>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn replace_last(name: &str, from: &str, to: &str) -> String {
    match name.rfind(from) {
        Some(i) => format!("{}{}{}", &name[..i], to, &name[i + from.len()..]),
        None => name.to_string(),
    }
}

impl GeometryImagePaths {
    /// Images written for a flat mesh at `flat_mesh` with the given size.
    ///
    /// `dir/stem.off` maps to `dir/stem_<size>_flatGI.png` and
    /// `dir/stem_<size>_nflatGI.png`.
    pub fn for_flat_mesh<P: AsRef<Path>>(flat_mesh: P, im_size: usize) -> Self {
        let flat_mesh = flat_mesh.as_ref();
        let dir = flat_mesh.parent().unwrap_or_else(|| Path::new(""));
        let stem = stem(flat_mesh);
        Self {
            position: dir.join(format!("{stem}_{im_size}_{POSITION_TOKEN}.png")),
            normal: Some(dir.join(format!("{stem}_{im_size}_{NORMAL_TOKEN}.png"))),
        }
    }

    /// Pair derived from either image of a pair.
    ///
    /// A path naming a normal image yields its position image. A path naming
    /// a position image yields its normal image. Anything else is treated as
    /// a position image without normals.
    pub fn from_image_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let name = file_name(path);
        if name.contains(NORMAL_TOKEN) {
            Self {
                position: path.with_file_name(replace_last(&name, NORMAL_TOKEN, POSITION_TOKEN)),
                normal: Some(path.to_path_buf()),
            }
        } else if name.contains(POSITION_TOKEN) {
            Self {
                position: path.to_path_buf(),
                normal: Some(path.with_file_name(replace_last(&name, POSITION_TOKEN, NORMAL_TOKEN))),
            }
        } else {
            Self {
                position: path.to_path_buf(),
                normal: None,
            }
        }
    }

    /// Drop the normal image from the pair.
    pub fn without_normal(mut self) -> Self {
        self.normal = None;
        self
    }

    /// Where the decoded mesh goes: `<out_dir>/<position image stem>.off`.
    pub fn decoded_mesh_path<P: AsRef<Path>>(&self, out_dir: P) -> PathBuf {
        out_dir.as_ref().join(format!("{}.off", stem(&self.position)))
    }
}

/// Flat mesh written for `mesh`: `<out_dir>/<stem>_arcSMI.off`.
pub fn flat_mesh_path<P: AsRef<Path>, Q: AsRef<Path>>(mesh: P, out_dir: Q) -> PathBuf {
    out_dir
        .as_ref()
        .join(format!("{}{FLAT_MESH_SUFFIX}.off", stem(mesh.as_ref())))
}

/// Sliced mesh written for `mesh`: `<out_dir>/<stem>.off`.
pub fn sliced_mesh_path<P: AsRef<Path>, Q: AsRef<Path>>(mesh: P, out_dir: Q) -> PathBuf {
    out_dir.as_ref().join(format!("{}.off", stem(mesh.as_ref())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_mesh_naming() {
        let flat = flat_mesh_path("/data/in/bunny.ply", "/data/out");
        assert_eq!(flat, PathBuf::from("/data/out/bunny_arcSMI.off"));

        let paths = GeometryImagePaths::for_flat_mesh(&flat, 64);
        assert_eq!(paths.position, PathBuf::from("/data/out/bunny_arcSMI_64_flatGI.png"));
        assert_eq!(
            paths.normal,
            Some(PathBuf::from("/data/out/bunny_arcSMI_64_nflatGI.png"))
        );
        assert_eq!(
            paths.decoded_mesh_path("/data/dec"),
            PathBuf::from("/data/dec/bunny_arcSMI_64_flatGI.off")
        );
    }

    #[test]
    fn test_pair_from_either_image() {
        let from_position = GeometryImagePaths::from_image_path("/x/a_64_flatGI.png");
        let from_normal = GeometryImagePaths::from_image_path("/x/a_64_nflatGI.png");
        assert_eq!(from_position, from_normal);
        assert_eq!(from_normal.position, PathBuf::from("/x/a_64_flatGI.png"));

        let plain = GeometryImagePaths::from_image_path("/x/photo.png");
        assert_eq!(plain.position, PathBuf::from("/x/photo.png"));
        assert!(plain.normal.is_none());
    }

    #[test]
    fn test_token_in_directory_is_ignored() {
        let paths = GeometryImagePaths::from_image_path("/flatGI/photo.png");
        assert!(paths.normal.is_none());
    }
}
