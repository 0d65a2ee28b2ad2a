//! RDF figures rendered with plotters' SVG backend, so no system fonts are needed.

use super::AnalysisError;
use super::rdf::RdfResult;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;
use tracing::info;

const FIGURE_SIZE: (u32, u32) = (800, 600);

fn plot_error(e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::Plot(e.to_string())
}

fn draw_rdfs<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, results: &[RdfResult]) -> Result<(), AnalysisError> {
    root.fill(&WHITE).map_err(plot_error)?;

    if results.is_empty() {
        root.draw(&Text::new(
            "No RDF data",
            (FIGURE_SIZE.0 as i32 / 2, FIGURE_SIZE.1 as i32 / 2),
            ("sans-serif", 20).into_font().color(&BLACK),
        ))
        .map_err(plot_error)?;
        return root.present().map_err(plot_error);
    }

    let (r_min, r_max) = results
        .iter()
        .flat_map(|r| [r.edges.first(), r.edges.last()])
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| (lo.min(r), hi.max(r)));
    let g_max = results
        .iter()
        .flat_map(|r| r.rdf.iter().copied())
        .filter(|g| g.is_finite())
        .fold(0.0, f64::max);
    let g_top = if g_max > 0.0 { g_max * 1.1 } else { 1.0 };
    if !(r_min.is_finite() && r_max > r_min) {
        return Err(AnalysisError::InvalidRange(format!("cannot plot r range {}..{}", r_min, r_max)));
    }

    let mut chart = ChartBuilder::on(root)
        .caption("Radial distribution functions", ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(r_min..r_max, 0.0..g_top)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("r (Angstrom)")
        .y_desc("g(r)")
        .draw()
        .map_err(plot_error)?;

    for (k, result) in results.iter().enumerate() {
        let color = Palette99::pick(k).to_rgba();
        chart
            .draw_series(LineSeries::new(
                result.bins.iter().copied().zip(result.rdf.iter().copied()),
                color.stroke_width(2),
            ))
            .map_err(plot_error)?
            .label(result.label.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_error)?;

    root.present().map_err(plot_error)
}

/// Renders every RDF into one chart and returns the SVG document.
pub fn render_rdfs_svg(results: &[RdfResult]) -> Result<String, AnalysisError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, FIGURE_SIZE).into_drawing_area();
        draw_rdfs(&root, results)?;
    }
    Ok(svg)
}

/// Writes every RDF into one SVG chart at `path`.
pub fn plot_rdfs<P: AsRef<Path>>(path: P, results: &[RdfResult]) -> Result<(), AnalysisError> {
    let path = path.as_ref();
    {
        let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
        draw_rdfs(&root, results)?;
    }
    info!(path = %path.display(), curves = results.len(), "Wrote RDF figure");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(label: &str, peak: f64) -> RdfResult {
        let edges: Vec<f64> = (0..=20).map(|k| k as f64 * 0.4).collect();
        let bins: Vec<f64> = edges.windows(2).map(|e| 0.5 * (e[0] + e[1])).collect();
        let rdf = bins.iter().map(|r| 1.0 + peak * (-(r - 2.8f64).powi(2)).exp()).collect();
        RdfResult {
            label: label.to_string(),
            counts: vec![0.0; bins.len()],
            bins,
            edges,
            rdf,
            frames: 1,
        }
    }

    #[test]
    fn renders_one_polyline_per_curve_with_legend() {
        let svg = render_rdfs_svg(&[result("O-O", 2.0), result("O-H", 0.5)]).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("O-O"));
        assert!(svg.contains("O-H"));
        assert!(svg.matches("<polyline").count() >= 2);
    }

    #[test]
    fn empty_input_still_produces_a_document() {
        let svg = render_rdfs_svg(&[]).unwrap();
        assert!(svg.contains("No RDF data"));
    }

    #[test]
    fn writes_svg_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rdf.svg");
        plot_rdfs(&path, &[result("O-O", 2.0)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("</svg>"));
    }
}
