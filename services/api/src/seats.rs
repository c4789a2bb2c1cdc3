//! Seat labels
//!
//! Seats are laid out in rows of six. Rows are lettered like spreadsheet
//! columns (`A`..`Z`, `AA`, `AB`, ...), seats within a row are numbered
//! `1..=6`, and the list is cut at the plane's capacity.

/// Seats per row
pub const SEATS_PER_ROW: usize = 6;

/// Letter label of the zero-based row `index`
pub fn row_label(index: usize) -> String {
    let mut label = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        n -= 1;
        label.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}

/// Every seat label of a plane with `capacity` seats, in seating order
pub fn seat_labels(capacity: usize) -> Vec<String> {
    let rows = capacity.div_ceil(SEATS_PER_ROW);
    (0..rows)
        .flat_map(|row| {
            let label = row_label(row);
            (1..=SEATS_PER_ROW).map(move |col| format!("{}{}", label, col))
        })
        .take(capacity)
        .collect()
}

/// Whether `seat_no` exists on a plane with `capacity` seats
pub fn seat_exists(seat_no: &str, capacity: usize) -> bool {
    let split = seat_no
        .find(|c: char| !c.is_ascii_uppercase())
        .unwrap_or(seat_no.len());
    let (letters, digits) = seat_no.split_at(split);

    if letters.is_empty() || letters.len() > 3 {
        return false;
    }
    // Plain digits only, `parse` alone would also take a sign
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Ok(col) = digits.parse::<usize>() else {
        return false;
    };
    if !(1..=SEATS_PER_ROW).contains(&col) {
        return false;
    }

    // Inverse of row_label
    let row = letters
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A') as usize + 1)
        - 1;

    row * SEATS_PER_ROW + col <= capacity
}
