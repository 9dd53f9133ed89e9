/// Content with inline images spliced in, plus where they landed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedImages {
    pub content: String,
    /// Paragraph index each image was inserted after.
    pub paragraph_indices: Vec<usize>,
}

/// Split on blank lines, dropping empty fragments.
pub fn split_paragraphs(content: &str) -> Vec<String> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Paragraph indices for spacing `image_count` images evenly through
/// `paragraph_count` paragraphs, keeping clear of the first and the
/// last two. Position i is floor((i+1)/(count+1) * paragraphs).
pub fn image_positions(image_count: usize, paragraph_count: usize) -> Vec<usize> {
    (0..image_count)
        .map(|i| {
            let fraction = (i + 1) as f64 / (image_count + 1) as f64;
            let raw = (fraction * paragraph_count as f64).floor() as usize;
            raw.min(paragraph_count.saturating_sub(2)).max(1)
        })
        .collect()
}

/// Insert inline images after evenly spaced paragraphs. The hero image
/// is the caller's business; pass only the images meant for the body.
/// Content with fewer than three paragraphs is returned untouched.
pub fn place_inline_images(content: &str, image_urls: &[String], title: &str) -> PlacedImages {
    let inline: Vec<&str> = image_urls
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .collect();
    if inline.is_empty() {
        return PlacedImages {
            content: content.to_string(),
            paragraph_indices: Vec::new(),
        };
    }

    let mut paragraphs = split_paragraphs(content);
    if paragraphs.len() < 3 {
        tracing::warn!(
            paragraphs = paragraphs.len(),
            "not enough paragraphs for inline images"
        );
        return PlacedImages {
            content: content.to_string(),
            paragraph_indices: Vec::new(),
        };
    }

    let positions = image_positions(inline.len(), paragraphs.len());
    tracing::debug!(images = inline.len(), positions = ?positions, "placing inline images");

    // Insert from the back so earlier indices stay valid.
    for i in (0..inline.len()).rev() {
        let markup = image_markup(inline[i], title, i + 1);
        paragraphs.insert(positions[i] + 1, markup);
    }

    PlacedImages {
        content: paragraphs.join("\n\n"),
        paragraph_indices: positions,
    }
}

fn image_markup(url: &str, title: &str, index: usize) -> String {
    let alt = if index == 1 {
        title.to_string()
    } else {
        format!("{title} - illustration {index}")
    };
    format!("![{alt}]({url})")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_paragraphs(count: usize) -> String {
        (1..=count)
            .map(|i| format!("Paragraph number {i} with a little body text."))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn urls(count: usize) -> Vec<String> {
        (1..=count)
            .map(|i| format!("https://img.example/photo-{i}"))
            .collect()
    }

    #[test]
    fn three_images_in_eight_paragraphs_land_evenly_inside_the_body() {
        let positions = image_positions(3, 8);
        assert_eq!(positions, vec![2, 4, 6]);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(positions.iter().all(|&p| (1..=6).contains(&p)));
    }

    #[test]
    fn eleven_paragraph_spacing_matches_the_floor_formula() {
        assert_eq!(image_positions(3, 11), vec![2, 5, 8]);
        assert_eq!(image_positions(1, 11), vec![5]);
        assert_eq!(image_positions(4, 11), vec![2, 4, 6, 8]);
    }

    #[test]
    fn positions_clamp_away_from_the_edges() {
        // With few paragraphs the clamp dominates the formula.
        assert_eq!(image_positions(2, 3), vec![1, 1]);
        assert_eq!(image_positions(1, 4), vec![2]);
    }

    #[test]
    fn placement_inserts_after_the_computed_paragraphs() {
        let content = numbered_paragraphs(8);
        let placed = place_inline_images(&content, &urls(3), "Launch Day");
        assert_eq!(placed.paragraph_indices, vec![2, 4, 6]);

        let blocks: Vec<&str> = placed.content.split("\n\n").collect();
        assert_eq!(blocks.len(), 11);
        assert_eq!(blocks[3], "![Launch Day](https://img.example/photo-1)");
        assert_eq!(
            blocks[6],
            "![Launch Day - illustration 2](https://img.example/photo-2)"
        );
        assert_eq!(
            blocks[9],
            "![Launch Day - illustration 3](https://img.example/photo-3)"
        );
    }

    #[test]
    fn short_content_is_left_untouched() {
        let content = numbered_paragraphs(2);
        let placed = place_inline_images(&content, &urls(2), "Title");
        assert_eq!(placed.content, content);
        assert!(placed.paragraph_indices.is_empty());
    }

    #[test]
    fn blank_urls_are_ignored() {
        let content = numbered_paragraphs(5);
        let placed = place_inline_images(
            &content,
            &["  ".to_string(), String::new()],
            "Title",
        );
        assert_eq!(placed.content, content);
        assert!(placed.paragraph_indices.is_empty());
    }
}
