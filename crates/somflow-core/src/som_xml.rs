//! Reading and writing the `SOM.xml` configuration document
//!
//! The document is the only channel through which the SOM trainer learns its
//! file locations and hyperparameters. Output is deterministic: the same
//! [`SomConfiguration`] always renders to the same bytes.
//!
//! ```text
//! <som_configuration>
//!     <som_files> input, output_somspace, output_geospace, output_folder
//!     <som_parameters> som_x .. scalecooling, <kMeans> number, number_min, number_max
//! ```

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, SomflowError};
use crate::models::{ClusterCounts, DecimalText, SomConfiguration, SomFiles, SomParameters};

const ROOT: &str = "som_configuration";
const FILES: &str = "som_files";
const PARAMETERS: &str = "som_parameters";
const KMEANS: &str = "kMeans";

fn xml_error(e: impl std::fmt::Display) -> SomflowError {
    SomflowError::Xml(e.to_string())
}

/// Render the document in its canonical form
pub fn render_configuration(cfg: &SomConfiguration) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    open(&mut writer, ROOT)?;

    let files = &cfg.files;
    open(&mut writer, FILES)?;
    text_element(&mut writer, "input", &path_text(&files.training_set))?;
    text_element(&mut writer, "output_somspace", &path_text(&files.somspace_export))?;
    text_element(&mut writer, "output_geospace", &path_text(&files.geospace_export))?;
    text_element(&mut writer, "output_folder", &path_text(&files.output_dir))?;
    close(&mut writer, FILES)?;

    let p = &cfg.parameters;
    open(&mut writer, PARAMETERS)?;
    text_element(&mut writer, "som_x", &p.grid_width.to_string())?;
    text_element(&mut writer, "som_y", &p.grid_height.to_string())?;
    text_element(&mut writer, "nEpoch", &p.epochs.to_string())?;
    text_element(&mut writer, "mapType", p.topology.as_str())?;
    text_element(&mut writer, "gridType", p.grid_shape.as_str())?;
    text_element(&mut writer, "neighborhood", p.neighborhood.as_str())?;
    text_element(&mut writer, "std_coeff", p.neighborhood_coeff.as_str())?;
    text_element(&mut writer, "initialization", p.initialization.as_str())?;
    text_element(&mut writer, "radius0", &p.radius_initial.to_string())?;
    text_element(&mut writer, "radiusN", &p.radius_final.to_string())?;
    text_element(&mut writer, "radiuscooling", p.radius_cooling.as_str())?;
    text_element(&mut writer, "scale0", p.rate_initial.as_str())?;
    text_element(&mut writer, "scaleN", p.rate_final.as_str())?;
    text_element(&mut writer, "scalecooling", p.rate_cooling.as_str())?;

    open(&mut writer, KMEANS)?;
    text_element(&mut writer, "number", &p.clusters.initial.to_string())?;
    text_element(&mut writer, "number_min", &p.clusters.min.to_string())?;
    text_element(&mut writer, "number_max", &p.clusters.max.to_string())?;
    close(&mut writer, KMEANS)?;

    close(&mut writer, PARAMETERS)?;
    close(&mut writer, ROOT)?;

    let mut document = String::from_utf8(writer.into_inner())
        .map_err(|e| SomflowError::Serialization(e.to_string()))?;
    document.push('\n');
    Ok(document)
}

/// Write the document to `dest` and return the written path
pub fn write_configuration(cfg: &SomConfiguration, dest: &Path) -> Result<PathBuf> {
    let document = render_configuration(cfg)?;
    fs::write(dest, document)?;
    tracing::info!(path = %dest.display(), "Wrote SOM configuration document");
    Ok(dest.to_path_buf())
}

/// Read a document previously written by [`write_configuration`]
pub fn read_configuration(path: &Path) -> Result<SomConfiguration> {
    let content = fs::read_to_string(path)?;
    parse_configuration(&content)
}

/// Parse a configuration document
///
/// Element order is not enforced; every known element must be present.
pub fn parse_configuration(content: &str) -> Result<SomConfiguration> {
    let fields = collect_fields(content)?;
    let doc = Fields(&fields);

    let files = SomFiles {
        training_set: PathBuf::from(doc.text(FILES, "input")?),
        somspace_export: PathBuf::from(doc.text(FILES, "output_somspace")?),
        geospace_export: PathBuf::from(doc.text(FILES, "output_geospace")?),
        output_dir: PathBuf::from(doc.text(FILES, "output_folder")?),
    };

    let kmeans = format!("{}/{}", PARAMETERS, KMEANS);
    let parameters = SomParameters {
        grid_width: doc.parse(PARAMETERS, "som_x")?,
        grid_height: doc.parse(PARAMETERS, "som_y")?,
        epochs: doc.parse(PARAMETERS, "nEpoch")?,
        topology: doc.parse(PARAMETERS, "mapType")?,
        grid_shape: doc.parse(PARAMETERS, "gridType")?,
        neighborhood: doc.parse(PARAMETERS, "neighborhood")?,
        neighborhood_coeff: doc.parse::<DecimalText>(PARAMETERS, "std_coeff")?,
        initialization: doc.parse(PARAMETERS, "initialization")?,
        radius_initial: doc.parse(PARAMETERS, "radius0")?,
        radius_final: doc.parse(PARAMETERS, "radiusN")?,
        radius_cooling: doc.parse(PARAMETERS, "radiuscooling")?,
        rate_initial: doc.parse(PARAMETERS, "scale0")?,
        rate_final: doc.parse(PARAMETERS, "scaleN")?,
        rate_cooling: doc.parse(PARAMETERS, "scalecooling")?,
        clusters: ClusterCounts {
            initial: doc.parse(&kmeans, "number")?,
            min: doc.parse(&kmeans, "number_min")?,
            max: doc.parse(&kmeans, "number_max")?,
        },
    };

    Ok(SomConfiguration { files, parameters })
}

fn open(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name))).map_err(xml_error)
}

fn close(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_error)
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer
        .create_element(name)
        .write_text_content(BytesText::new(text))
        .map_err(xml_error)?;
    Ok(())
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Flatten leaf elements into `parent/child` keys below the root element
///
/// Leaf text is kept verbatim. Whitespace-only text never replaces text
/// already collected for the same key.
fn collect_fields(content: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(content);

    let mut stack: Vec<String> = Vec::new();
    let mut fields = HashMap::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if stack.is_empty() && name != ROOT {
                    return Err(SomflowError::ConfigDocument {
                        element: name,
                        reason: format!("is not the expected root <{}>", ROOT),
                    });
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push(name);
                fields.insert(field_key(&stack), String::new());
                stack.pop();
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(xml_error)?;
                if stack.len() > 1 {
                    if text.trim().is_empty() {
                        fields.entry(field_key(&stack)).or_insert_with(|| text.into_owned());
                    } else {
                        fields.insert(field_key(&stack), text.into_owned());
                    }
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if fields.is_empty() {
        return Err(SomflowError::ConfigDocument {
            element: ROOT.to_string(),
            reason: "is missing or empty".to_string(),
        });
    }

    Ok(fields)
}

fn field_key(stack: &[String]) -> String {
    stack[1..].join("/")
}

struct Fields<'a>(&'a HashMap<String, String>);

impl Fields<'_> {
    fn text(&self, section: &str, name: &str) -> Result<&str> {
        let key = format!("{}/{}", section, name);
        match self.0.get(&key) {
            Some(value) if !value.is_empty() => Ok(value),
            Some(_) => Err(SomflowError::ConfigDocument {
                element: name.to_string(),
                reason: "is empty".to_string(),
            }),
            None => Err(SomflowError::ConfigDocument {
                element: name.to_string(),
                reason: format!("is missing from <{}>", section),
            }),
        }
    }

    fn parse<T>(&self, section: &str, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.text(section, name)?.trim();
        raw.parse::<T>().map_err(|e| SomflowError::ConfigDocument {
            element: name.to_string(),
            reason: format!("has invalid value '{}': {}", raw, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Cooling, GridShape, Initialization, MapTopology, NeighborhoodFunction, WorkspaceLayout,
    };

    fn sample() -> SomConfiguration {
        let layout = WorkspaceLayout::at("/work/som");
        SomConfiguration::for_layout(
            &layout,
            SomParameters {
                grid_width: 10,
                grid_height: 8,
                epochs: 1000,
                topology: MapTopology::Toroid,
                grid_shape: GridShape::Hexagonal,
                neighborhood: NeighborhoodFunction::Gaussian,
                neighborhood_coeff: DecimalText::parse("0,5").unwrap(),
                initialization: Initialization::Pca,
                radius_initial: 0,
                radius_final: 1,
                radius_cooling: Cooling::Linear,
                rate_initial: DecimalText::parse("0,1").unwrap(),
                rate_final: DecimalText::parse("0.01").unwrap(),
                rate_cooling: Cooling::Exponential,
                clusters: ClusterCounts { initial: 5, min: 2, max: 25 },
            },
        )
    }

    #[test]
    fn test_render_contains_normalized_decimals() {
        let doc = render_configuration(&sample()).unwrap();
        assert!(doc.contains("<std_coeff>0.5</std_coeff>"));
        assert!(doc.contains("<scale0>0.1</scale0>"));
        assert!(doc.contains("<som_x>10</som_x>"));
        assert!(doc.contains("<som_y>8</som_y>"));
        assert!(doc.contains("<mapType>toroid</mapType>"));
        assert!(!doc.contains("0,5"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let cfg = sample();
        assert_eq!(render_configuration(&cfg).unwrap(), render_configuration(&cfg).unwrap());
    }

    #[test]
    fn test_element_order() {
        let doc = render_configuration(&sample()).unwrap();
        let order = [
            "<som_files>", "<input>", "<output_somspace>", "<output_geospace>",
            "<output_folder>", "<som_parameters>", "<som_x>", "<som_y>", "<nEpoch>",
            "<mapType>", "<gridType>", "<neighborhood>", "<std_coeff>", "<initialization>",
            "<radius0>", "<radiusN>", "<radiuscooling>", "<scale0>", "<scaleN>",
            "<scalecooling>", "<kMeans>", "<number>", "<number_min>", "<number_max>",
        ];
        let positions: Vec<usize> = order.iter().map(|tag| doc.find(tag).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_round_trip() {
        let cfg = sample();
        let parsed = parse_configuration(&render_configuration(&cfg).unwrap()).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_round_trip_keeps_path_whitespace() {
        let mut cfg = sample();
        cfg.files.training_set = PathBuf::from(" ws/SOM.lrn");
        cfg.files.output_dir = PathBuf::from("out ");

        let parsed = parse_configuration(&render_configuration(&cfg).unwrap()).unwrap();

        assert_eq!(parsed.files.training_set, PathBuf::from(" ws/SOM.lrn"));
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_padded_numbers_accepted() {
        let doc = render_configuration(&sample())
            .unwrap()
            .replace("<som_x>10</som_x>", "<som_x> 10 </som_x>");
        assert_eq!(parse_configuration(&doc).unwrap().parameters.grid_width, 10);
    }

    #[test]
    fn test_missing_element_named() {
        let doc = render_configuration(&sample())
            .unwrap()
            .replace("<nEpoch>1000</nEpoch>", "");
        let err = parse_configuration(&doc).unwrap_err();
        assert!(matches!(err, SomflowError::ConfigDocument { ref element, .. } if element == "nEpoch"));
    }

    #[test]
    fn test_invalid_keyword_rejected() {
        let doc = render_configuration(&sample())
            .unwrap()
            .replace("<gridType>hexagonal</gridType>", "<gridType>triangle</gridType>");
        assert!(parse_configuration(&doc).is_err());
    }

    #[test]
    fn test_wrong_root_rejected() {
        let err = parse_configuration("<config><som_files/></config>").unwrap_err();
        assert!(matches!(err, SomflowError::ConfigDocument { .. }));
    }
}
