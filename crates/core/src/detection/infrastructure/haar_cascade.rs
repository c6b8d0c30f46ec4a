//! Pretrained Haar cascade model in the OpenCV `opencv_storage` XML layout.
//!
//! Only boosted (`BOOST`) cascades of upright `HAAR` features are supported,
//! which covers the stock frontal face cascades. The model is parsed once and
//! is immutable afterwards.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use roxmltree::Node;

use crate::detection::infrastructure::integral_image::IntegralImage;
use crate::shared::error::AnnotateError;

/// Weighted rectangle of a Haar feature, in window coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct HaarRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HaarFeature {
    pub rects: Vec<HaarRect>,
}

impl HaarFeature {
    /// Raw (un-normalized) response of the feature for the window at `(x, y)`.
    fn response(&self, integral: &IntegralImage, x: usize, y: usize) -> f64 {
        self.rects
            .iter()
            .map(|r| r.weight * integral.rect_sum(x + r.x, y + r.y, r.width, r.height) as f64)
            .sum()
    }
}

/// Split node of a weak classifier tree.
///
/// A child index `> 0` points at another node; `<= 0` is a leaf whose value
/// lives at `leaves[-child]`.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    pub left: i32,
    pub right: i32,
    pub feature: usize,
    pub threshold: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeakClassifier {
    pub nodes: Vec<TreeNode>,
    pub leaves: Vec<f64>,
}

impl WeakClassifier {
    fn vote(&self, features: &[HaarFeature], integral: &IntegralImage, x: usize, y: usize, inv_norm: f64) -> f64 {
        let mut idx: i32 = 0;
        loop {
            let node = &self.nodes[idx as usize];
            let value = features[node.feature].response(integral, x, y) * inv_norm;
            idx = if value < node.threshold {
                node.left
            } else {
                node.right
            };
            if idx <= 0 {
                return self.leaves[(-idx) as usize];
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stage {
    pub threshold: f64,
    pub classifiers: Vec<WeakClassifier>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HaarCascade {
    window_width: usize,
    window_height: usize,
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl HaarCascade {
    /// Loads and validates a cascade file. Any I/O or format problem is
    /// reported as [`AnnotateError::ModelUnavailable`].
    pub fn from_file(path: &Path) -> Result<Self, AnnotateError> {
        let text = fs::read_to_string(path).map_err(|e| {
            AnnotateError::ModelUnavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_xml(&text).map_err(|e| match e {
            AnnotateError::ModelUnavailable(reason) => {
                AnnotateError::ModelUnavailable(format!("{}: {reason}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_xml(text: &str) -> Result<Self, AnnotateError> {
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| model_error(format!("malformed XML: {e}")))?;
        let cascade = child(doc.root_element(), "cascade")?;

        let stage_type = text_of(child(cascade, "stageType")?);
        if stage_type != "BOOST" {
            return Err(model_error(format!("unsupported stage type '{stage_type}'")));
        }
        let feature_type = text_of(child(cascade, "featureType")?);
        if feature_type != "HAAR" {
            return Err(model_error(format!(
                "unsupported feature type '{feature_type}'"
            )));
        }

        let window_width: usize = parse(text_of(child(cascade, "width")?), "width")?;
        let window_height: usize = parse(text_of(child(cascade, "height")?), "height")?;
        if window_width < 3 || window_height < 3 {
            return Err(model_error(format!(
                "window {window_width}x{window_height} is too small"
            )));
        }

        let features = items(child(cascade, "features")?)
            .map(|node| parse_feature(node, window_width, window_height))
            .collect::<Result<Vec<_>, _>>()?;
        let stages = items(child(cascade, "stages")?)
            .map(parse_stage)
            .collect::<Result<Vec<_>, _>>()?;

        if stages.is_empty() {
            return Err(model_error("cascade has no stages".to_string()));
        }
        if let Some(node) = cascade.children().find(|n| n.has_tag_name("stageNum")) {
            let declared: usize = parse(text_of(node), "stageNum")?;
            if declared != stages.len() {
                return Err(model_error(format!(
                    "declares {declared} stages but defines {}",
                    stages.len()
                )));
            }
        }

        let cascade = Self {
            window_width,
            window_height,
            stages,
            features,
        };
        cascade.check_references()?;
        Ok(cascade)
    }

    /// Detection window `(width, height)` the cascade was trained on.
    pub fn window_size(&self) -> (usize, usize) {
        (self.window_width, self.window_height)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn features(&self) -> &[HaarFeature] {
        &self.features
    }

    /// Runs the window at `(x, y)` through every stage; `true` when all pass.
    /// Low-contrast windows are rejected before the first stage.
    pub fn classify(&self, integral: &IntegralImage, x: usize, y: usize) -> bool {
        let Some(inv_norm) =
            integral.inverse_norm(x + 1, y + 1, self.window_width - 2, self.window_height - 2)
        else {
            return false;
        };
        self.stages.iter().all(|stage| {
            let sum: f64 = stage
                .classifiers
                .iter()
                .map(|wc| wc.vote(&self.features, integral, x, y, inv_norm))
                .sum();
            sum >= stage.threshold
        })
    }

    fn check_references(&self) -> Result<(), AnnotateError> {
        for (si, stage) in self.stages.iter().enumerate() {
            for wc in &stage.classifiers {
                for (ni, node) in wc.nodes.iter().enumerate() {
                    if node.feature >= self.features.len() {
                        return Err(model_error(format!(
                            "stage {si} references missing feature {}",
                            node.feature
                        )));
                    }
                    for branch in [node.left, node.right] {
                        // Children come after their parent, so walks always end.
                        let in_range = if branch > 0 {
                            (branch as usize) > ni && (branch as usize) < wc.nodes.len()
                        } else {
                            (branch.unsigned_abs() as usize) < wc.leaves.len()
                        };
                        if !in_range {
                            return Err(model_error(format!(
                                "stage {si} has a dangling tree branch {branch}"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn parse_stage(node: Node) -> Result<Stage, AnnotateError> {
    let threshold = parse(text_of(child(node, "stageThreshold")?), "stageThreshold")?;
    let classifiers = items(child(node, "weakClassifiers")?)
        .map(parse_weak_classifier)
        .collect::<Result<Vec<_>, _>>()?;
    if classifiers.is_empty() {
        return Err(model_error("stage without weak classifiers".to_string()));
    }
    Ok(Stage {
        threshold,
        classifiers,
    })
}

fn parse_weak_classifier(node: Node) -> Result<WeakClassifier, AnnotateError> {
    let raw_nodes: Vec<f64> = numbers(child(node, "internalNodes")?, "internalNodes")?;
    if raw_nodes.is_empty() || raw_nodes.len() % 4 != 0 {
        return Err(model_error(format!(
            "internalNodes must hold groups of 4 values, got {}",
            raw_nodes.len()
        )));
    }
    let nodes = raw_nodes
        .chunks_exact(4)
        .map(|q| {
            if q[2] < 0.0 || q[2].fract() != 0.0 || q[0].fract() != 0.0 || q[1].fract() != 0.0 {
                return Err(model_error(format!("malformed tree node {q:?}")));
            }
            Ok(TreeNode {
                left: q[0] as i32,
                right: q[1] as i32,
                feature: q[2] as usize,
                threshold: q[3],
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let leaves = numbers(child(node, "leafValues")?, "leafValues")?;
    Ok(WeakClassifier { nodes, leaves })
}

fn parse_feature(node: Node, window_w: usize, window_h: usize) -> Result<HaarFeature, AnnotateError> {
    if let Some(tilted) = node.children().find(|n| n.has_tag_name("tilted")) {
        if text_of(tilted) != "0" {
            return Err(model_error("tilted features are not supported".to_string()));
        }
    }
    let rects = items(child(node, "rects")?)
        .map(|r| {
            let v: Vec<f64> = numbers(r, "rect")?;
            if v.len() != 5 || v[..4].iter().any(|c| *c < 0.0 || c.fract() != 0.0) {
                return Err(model_error(format!("malformed feature rectangle {v:?}")));
            }
            let rect = HaarRect {
                x: v[0] as usize,
                y: v[1] as usize,
                width: v[2] as usize,
                height: v[3] as usize,
                weight: v[4],
            };
            if rect.x + rect.width > window_w || rect.y + rect.height > window_h {
                return Err(model_error(format!(
                    "feature rectangle {v:?} exceeds the {window_w}x{window_h} window"
                )));
            }
            Ok(rect)
        })
        .collect::<Result<Vec<_>, _>>()?;
    if rects.is_empty() {
        return Err(model_error("feature without rectangles".to_string()));
    }
    Ok(HaarFeature { rects })
}

fn model_error(reason: String) -> AnnotateError {
    AnnotateError::ModelUnavailable(reason)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Result<Node<'a, 'input>, AnnotateError> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .ok_or_else(|| model_error(format!("missing <{name}> element")))
}

/// OpenCV serializes sequences as repeated `<_>` children.
fn items<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.has_tag_name("_"))
}

fn text_of<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().unwrap_or("").trim()
}

fn parse<T: FromStr>(text: &str, what: &str) -> Result<T, AnnotateError> {
    text.parse()
        .map_err(|_| model_error(format!("invalid {what} value '{text}'")))
}

fn numbers(node: Node, what: &str) -> Result<Vec<f64>, AnnotateError> {
    text_of(node)
        .split_whitespace()
        .map(|token| parse(token, what))
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// One-stage, one-stump cascade with a 20x20 window whose single feature
    /// fires when the central 10x10 block is brighter than its surround.
    pub fn center_spot_cascade_xml() -> String {
        cascade_xml(
            20,
            20,
            "<_><maxWeakCount>1</maxWeakCount>\
             <stageThreshold>0.5</stageThreshold>\
             <weakClassifiers><_>\
               <internalNodes>0 -1 0 1.0</internalNodes>\
               <leafValues>-1. 1.</leafValues>\
             </_></weakClassifiers></_>",
            "<_><rects><_>0 0 20 20 -1.</_><_>5 5 10 10 4.</_></rects></_>",
            1,
        )
    }

    /// Two-stage 24x24 cascade keyed to a cartoon face: dark eye band over
    /// bright cheeks, bright nose bridge between the eyes, dark mouth.
    pub fn cartoon_face_cascade_xml() -> String {
        cascade_xml(
            24,
            24,
            "<_><maxWeakCount>1</maxWeakCount>\
             <stageThreshold>0.5</stageThreshold>\
             <weakClassifiers><_>\
               <internalNodes>0 -1 0 -0.12</internalNodes>\
               <leafValues>1. -1.</leafValues>\
             </_></weakClassifiers></_>\
             <_><maxWeakCount>2</maxWeakCount>\
             <stageThreshold>1.5</stageThreshold>\
             <weakClassifiers><_>\
               <internalNodes>0 -1 1 0.1</internalNodes>\
               <leafValues>-1. 1.</leafValues>\
             </_><_>\
               <internalNodes>0 -1 2 -0.12</internalNodes>\
               <leafValues>1. -1.</leafValues>\
             </_></weakClassifiers></_>",
            "<_><rects><_>2 6 20 5 1.</_><_>2 11 20 5 -1.</_></rects></_>\
             <_><rects><_>4 6 16 5 -1.</_><_>10 6 4 5 4.</_></rects></_>\
             <_><rects><_>6 14 12 7 -1.</_><_>6 16 12 3 2.</_></rects></_>",
            2,
        )
    }

    /// Grey frame with a cartoon face drawn in the `size`-pixel square at
    /// `(fx, fy)`.
    pub fn cartoon_face(
        width: u32,
        height: u32,
        fx: u32,
        fy: u32,
        size: u32,
    ) -> image::GrayImage {
        image::GrayImage::from_fn(width, height, |px, py| {
            let inside = (fx..fx + size).contains(&px) && (fy..fy + size).contains(&py);
            if !inside {
                return image::Luma([90]);
            }
            let u = (px - fx) as f64 / size as f64;
            let v = (py - fy) as f64 / size as f64;
            let eye = (0.30..0.42).contains(&v)
                && ((0.2..0.4).contains(&u) || (0.6..0.8).contains(&u));
            let mouth = (0.68..0.78).contains(&v) && (0.33..0.67).contains(&u);
            image::Luma([if eye {
                40
            } else if mouth {
                60
            } else {
                200
            }])
        })
    }

    pub fn cascade_xml(
        width: usize,
        height: usize,
        stages: &str,
        features: &str,
        stage_num: usize,
    ) -> String {
        format!(
            "<?xml version=\"1.0\"?>\n<opencv_storage>\n\
             <cascade type_id=\"opencv-cascade-classifier\">\
             <stageType>BOOST</stageType>\
             <featureType>HAAR</featureType>\
             <height>{height}</height>\
             <width>{width}</width>\
             <stageNum>{stage_num}</stageNum>\
             <stages>\n<!-- stage 0 -->\n{stages}</stages>\
             <features>{features}</features>\
             </cascade>\n</opencv_storage>\n"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use image::GrayImage;
    use rstest::rstest;

    fn spot_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, y| {
            let inside = (5..15).contains(&x) && (5..15).contains(&y);
            image::Luma([if inside { 255 } else { 0 }])
        })
    }

    fn assert_model_error(xml: &str, fragment: &str) {
        match HaarCascade::from_xml(xml) {
            Err(AnnotateError::ModelUnavailable(reason)) => assert!(
                reason.contains(fragment),
                "reason '{reason}' should mention '{fragment}'"
            ),
            other => panic!("expected ModelUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_parses_window_stages_and_features() {
        let cascade = HaarCascade::from_xml(&center_spot_cascade_xml()).unwrap();
        assert_eq!(cascade.window_size(), (20, 20));
        assert_eq!(cascade.stages().len(), 1);
        assert_eq!(cascade.stages()[0].threshold, 0.5);
        assert_eq!(cascade.features().len(), 1);
        let rects = &cascade.features()[0].rects;
        assert_eq!(rects.len(), 2);
        assert_eq!(
            rects[1],
            HaarRect {
                x: 5,
                y: 5,
                width: 10,
                height: 10,
                weight: 4.0
            }
        );
        let node = &cascade.stages()[0].classifiers[0].nodes[0];
        assert_eq!((node.left, node.right, node.feature), (0, -1, 0));
    }

    #[test]
    fn test_classify_bright_center_passes() {
        let cascade = HaarCascade::from_xml(&center_spot_cascade_xml()).unwrap();
        let integral = IntegralImage::new(&spot_image());
        assert!(cascade.classify(&integral, 0, 0));
    }

    #[test]
    fn test_classify_flat_window_fails() {
        let cascade = HaarCascade::from_xml(&center_spot_cascade_xml()).unwrap();
        for value in [0u8, 128, 255] {
            let integral = IntegralImage::new(&GrayImage::from_pixel(20, 20, image::Luma([value])));
            assert!(!cascade.classify(&integral, 0, 0));
        }
    }

    #[test]
    fn test_classify_dark_center_fails() {
        let cascade = HaarCascade::from_xml(&center_spot_cascade_xml()).unwrap();
        let mut img = spot_image();
        image::imageops::invert(&mut img);
        let integral = IntegralImage::new(&img);
        assert!(!cascade.classify(&integral, 0, 0));
    }

    #[test]
    fn test_classify_faint_spot_fails() {
        // Center one grey level above the surround; plain sensor noise.
        let img = GrayImage::from_fn(20, 20, |x, y| {
            let inside = (5..15).contains(&x) && (5..15).contains(&y);
            image::Luma([if inside { 101 } else { 100 }])
        });
        let cascade = HaarCascade::from_xml(&center_spot_cascade_xml()).unwrap();
        assert!(!cascade.classify(&IntegralImage::new(&img), 0, 0));
    }

    #[test]
    fn test_multi_node_tree_follows_branches() {
        // Root splits on feature 0; right child (node 1) splits again.
        let stages = "<_><stageThreshold>0.5</stageThreshold><weakClassifiers><_>\
                      <internalNodes>0 1 0 1.0 -1 -2 0 100.0</internalNodes>\
                      <leafValues>-1. 1. -1.</leafValues>\
                      </_></weakClassifiers></_>";
        let features = "<_><rects><_>0 0 20 20 -1.</_><_>5 5 10 10 4.</_></rects></_>";
        let cascade = HaarCascade::from_xml(&cascade_xml(20, 20, stages, features, 1)).unwrap();
        // Bright center: root goes right to node 1, value < 100 → leaf 1 (+1).
        let integral = IntegralImage::new(&spot_image());
        assert!(cascade.classify(&integral, 0, 0));
    }

    #[test]
    fn test_rejects_malformed_xml() {
        assert_model_error("<opencv_storage><cascade>", "malformed XML");
    }

    #[test]
    fn test_rejects_missing_cascade() {
        assert_model_error("<opencv_storage/>", "<cascade>");
    }

    #[test]
    fn test_rejects_lbp_features() {
        let xml = center_spot_cascade_xml().replace(">HAAR<", ">LBP<");
        assert_model_error(&xml, "feature type");
    }

    #[test]
    fn test_rejects_tilted_features() {
        let xml = center_spot_cascade_xml().replace("</rects>", "</rects><tilted>1</tilted>");
        assert_model_error(&xml, "tilted");
    }

    #[test]
    fn test_rejects_rect_outside_window() {
        let xml = center_spot_cascade_xml().replace("5 5 10 10 4.", "15 15 10 10 4.");
        assert_model_error(&xml, "exceeds");
    }

    #[test]
    fn test_rejects_dangling_feature_index() {
        let xml = center_spot_cascade_xml().replace("0 -1 0 1.0", "0 -1 7 1.0");
        assert_model_error(&xml, "missing feature 7");
    }

    #[test]
    fn test_rejects_dangling_leaf() {
        let xml = center_spot_cascade_xml().replace("0 -1 0 1.0", "0 -5 0 1.0");
        assert_model_error(&xml, "dangling");
    }

    #[rstest]
    #[case::self_loop("1 -1 0 1.0e9 1 1 0 1.0e9")]
    #[case::back_edge("1 -1 0 1.0 2 -1 0 1.0 1 -1 0 1.0")]
    fn test_rejects_cyclic_tree(#[case] nodes: &str) {
        let xml = center_spot_cascade_xml().replace("0 -1 0 1.0", nodes);
        assert_model_error(&xml, "dangling");
    }

    #[test]
    fn test_rejects_stage_count_mismatch() {
        let xml = center_spot_cascade_xml().replace("<stageNum>1<", "<stageNum>3<");
        assert_model_error(&xml, "declares 3 stages");
    }

    #[test]
    fn test_rejects_non_numeric_threshold() {
        let xml = center_spot_cascade_xml().replace("<stageThreshold>0.5", "<stageThreshold>abc");
        assert_model_error(&xml, "stageThreshold");
    }

    #[test]
    fn test_from_file_missing_is_model_unavailable() {
        let result = HaarCascade::from_file(Path::new("/nonexistent/cascade.xml"));
        assert!(matches!(result, Err(AnnotateError::ModelUnavailable(_))));
    }

    #[test]
    fn test_from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cascade.xml");
        fs::write(&path, center_spot_cascade_xml()).unwrap();
        let cascade = HaarCascade::from_file(&path).unwrap();
        assert_eq!(cascade.window_size(), (20, 20));
    }

    #[test]
    fn test_from_file_corrupt_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xml");
        fs::write(&path, "not xml at all <<<").unwrap();
        match HaarCascade::from_file(&path) {
            Err(AnnotateError::ModelUnavailable(reason)) => {
                assert!(reason.contains("broken.xml"))
            }
            other => panic!("expected ModelUnavailable, got {other:?}"),
        }
    }
}
