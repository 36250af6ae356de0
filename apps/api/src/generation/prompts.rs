// Instruction templates for each document variant.
// Slots: {context} (retrieved resume text) and {input} (the job posting).
// The constraints below are requests to the model; nothing enforces them
// on the reply (see generation::review for the non-blocking check).

/// Full cover letter, 150-250 word body.
pub const COVER_LETTER_TEMPLATE: &str = r#"Write a cover letter using the format below. Use the two inputs at the end as the only sources of context.

FORMAT:

Dear Hiring Team,

<body>

Best Regards,
<candidate name>

INSTRUCTIONS FOR THE BODY:
- Sound professional and natural, as if written by the candidate.
- Keep the body between 150 and 250 words.
- Step 1: pick out the important ATS keywords from Input 2.
- Step 2: pick out what Input 2 says about the company (vision, products).
- Step 3: combine Steps 1 and 2 with the candidate's background from Input 1.
- Highlight the experience from Input 1 that matches the keywords from Step 1.
- Never refer to the posting itself (no phrases like "job description" or "as mentioned in the posting").
- Spend no more than 2 lines on the company vision.

Input 1 - Resume of the applying candidate: {context}
Input 2 - The role being applied for: {input}

Return only the cover letter in the format above, with no headings or commentary.
The last line must contain only the candidate's name, for example: John Doe"#;

/// Short LinkedIn outreach message, 50-150 word body.
pub const LINKEDIN_MESSAGE_TEMPLATE: &str = r#"Write a LinkedIn chat message to a recruiter or hiring manager using the format below. Use the two inputs at the end as the only sources of context.

FORMAT:

Dear <recipient name, or "Hiring Team" if unknown>,

<body>

Best Regards,
<candidate name>

INSTRUCTIONS FOR THE BODY:
- Sound professional and natural, as if written by the candidate.
- Keep the body between 50 and 150 words.
- Step 1: pick out the important ATS keywords from Input 2.
- Step 2: pick out what Input 2 says about the company (vision, products).
- Step 3: combine Steps 1 and 2 with the candidate's background from Input 1.
- Highlight the experience from Input 1 that matches the keywords from Step 1.
- Never refer to the posting itself (no phrases like "job description" or "as mentioned in the posting").
- Spend no more than 1 line on the company vision.

Input 1 - Resume of the applying candidate: {context}
Input 2 - The role being applied for: {input}

Return only the message in the format above, with no headings or commentary.
The last line must contain only the candidate's name, for example: John Doe"#;
